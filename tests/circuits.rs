//! Numerical behaviour of complete circuits built from netlists.

use std::f64::consts::TAU;

use approx::assert_relative_eq;
use electree_core::{dsl, realtime, Simulation, SimulationConfig, WdfError, WdfTree};

fn built(netlist: &str, config: SimulationConfig) -> Simulation {
    let ast = dsl::parse(netlist).unwrap();
    let mut sim = Simulation::from_ast(&ast, config).unwrap();
    sim.build().unwrap();
    sim
}

fn tree_from(netlist: &str, sample_rate: f64) -> WdfTree {
    built(netlist, SimulationConfig::new().with_sample_rate(sample_rate))
        .take_tree()
        .unwrap()
}

fn sine(frequency: f64, sample_rate: f64, len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| (TAU * frequency * n as f64 / sample_rate).sin() as f32)
        .collect()
}

fn rms(samples: &[f32]) -> f64 {
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}

fn rc_lowpass(capacitance: &str) -> String {
    format!(
        "V1 in 0 AC 1 rs=0 input\n\
         R1 in out 1k\n\
         C1 out 0 {capacitance} output\n"
    )
}

#[test]
fn rc_lowpass_magnitude_matches_analytic() {
    let fs = 48000.0;
    let f = 1000.0;
    let mut tree = tree_from(&rc_lowpass("100n"), fs);

    let input = sine(f, fs, 48000);
    let output: Vec<f32> = input.iter().map(|&x| tree.process(x).unwrap()).collect();

    // Steady state over a whole number of periods
    let measured = rms(&output[24000..]) * std::f64::consts::SQRT_2;
    let rc = 1e3 * 100e-9;
    let expected = 1.0 / (1.0 + (TAU * f * rc).powi(2)).sqrt();
    assert_relative_eq!(measured, expected, max_relative = 0.01);
}

#[test]
fn doubling_rate_and_halving_capacitance_gives_same_samples() {
    // Bilinear discretisation depends only on f/fs and RC*fs
    let mut slow = tree_from(&rc_lowpass("100n"), 48000.0);
    let mut fast = tree_from(&rc_lowpass("50n"), 96000.0);

    let a = sine(1000.0, 48000.0, 2000);
    let b = sine(2000.0, 96000.0, 2000);
    for (x, y) in a.iter().zip(&b) {
        let out_slow = slow.process(*x).unwrap();
        let out_fast = fast.process(*y).unwrap();
        assert_relative_eq!(out_slow, out_fast, epsilon = 1e-5);
    }
}

#[test]
fn higher_rate_still_matches_analytic() {
    let fs = 96000.0;
    let f = 3000.0;
    let mut tree = tree_from(&rc_lowpass("100n"), fs);
    let input = sine(f, fs, 96000);
    let output: Vec<f32> = input.iter().map(|&x| tree.process(x).unwrap()).collect();

    // 3 kHz at 96 kHz: 32 samples per period
    let measured = rms(&output[32000..]) * std::f64::consts::SQRT_2;
    let expected = 1.0 / (1.0 + (TAU * f * 1e-4).powi(2)).sqrt();
    assert_relative_eq!(measured, expected, max_relative = 0.01);
}

#[test]
fn source_free_rc_discharges_monotonically() {
    let mut tree = tree_from("C1 a 0 1u ic=1 output\nR1 a 0 1k\n", 48000.0);
    let mut energy = tree.stored_energy();
    assert!(energy > 0.0);

    let mut previous_v = f32::INFINITY;
    for _ in 0..2000 {
        let v = tree.process(0.0).unwrap();
        assert!(v <= previous_v);
        previous_v = v;

        let next = tree.stored_energy();
        assert!(next <= energy * (1.0 + 1e-12));
        energy = next;
    }
    // Time constant is 1 ms; 2000 samples is about 42 ms
    assert!(previous_v.abs() < 1e-6);
}

#[test]
fn source_free_rlc_never_gains_energy() {
    let mut tree = tree_from("C1 a 0 1u ic=1\nL1 a b 10m\nR1 b 0 50\n", 48000.0);
    let start = tree.stored_energy();
    let mut energy = start;
    for _ in 0..5000 {
        tree.process(0.0).unwrap();
        let next = tree.stored_energy();
        assert!(next <= energy * (1.0 + 1e-9) + 1e-18, "{next} > {energy}");
        energy = next;
    }
    assert!(energy < start);
}

#[test]
fn bridge_matches_nodal_analysis() {
    // Nodal solution: V(l) = 63/85, V(r) = 58/85
    let netlist = "\
V1 top 0 DC 1 rs=0
R1 top l 1k
R2 top r 2k
R3 l 0 3k
R4 r 0 4k
R5 l r 5k output
";
    let mut tree = tree_from(netlist, 48000.0);
    for _ in 0..4 {
        let v = tree.process(0.0).unwrap();
        assert_relative_eq!(f64::from(v), 1.0 / 17.0, epsilon = 1e-6);
    }

    let left_node = netlist.replace("R5 l r 5k output", "R5 l r 5k").replace("R3 l 0 3k", "R3 l 0 3k output");
    let mut tree = tree_from(&left_node, 48000.0);
    let v = tree.process(0.0).unwrap();
    assert_relative_eq!(f64::from(v), 63.0 / 85.0, epsilon = 1e-6);
}

#[test]
fn diode_clipper_is_bounded() {
    let netlist = "\
V1 in 0 AC 5 rs=1 input
R1 in out 1k
DP1 out 0 output
";
    let mut tree = tree_from(netlist, 48000.0);
    let input = sine(200.0, 48000.0, 4800);

    let mut peak = 0.0f32;
    for x in input {
        let y = tree.process(x).unwrap();
        peak = peak.max(y.abs());
    }
    assert!(peak > 0.6, "no clipping action: peak {peak}");
    assert!(peak < 0.75, "output exceeds forward voltage: peak {peak}");
}

#[test]
fn clipper_is_symmetric() {
    let netlist = "V1 in 0 AC 5 input\nR1 in out 1k\nDP1 out 0 output\n";
    let mut pos = tree_from(netlist, 48000.0);
    let mut neg = tree_from(netlist, 48000.0);
    for n in 0..200 {
        let x = (n as f32 * 0.05).sin();
        let a = pos.process(x).unwrap();
        let b = neg.process(-x).unwrap();
        assert_relative_eq!(a, -b, epsilon = 1e-5);
    }
}

#[test]
fn ideal_source_away_from_root_is_rejected() {
    let netlist = "V1 in 0 AC 1 rs=0 input\nR1 in out 1k\nD1 out 0\n";
    let ast = dsl::parse(netlist).unwrap();
    let mut sim = Simulation::from_ast(&ast, SimulationConfig::new()).unwrap();
    match sim.build() {
        Err(WdfError::UnsupportedComponent { component, .. }) => assert_eq!(component, "V1"),
        other => panic!("expected unsupported component, got {other:?}"),
    }
}

#[test]
fn current_source_pushes_current_out_of_negative_terminal() {
    // 1 mA into node a through 1k || 1M
    let mut tree = tree_from("I1 0 a DC 1m\nR1 a 0 1k output\n", 48000.0);
    let expected = 1e-3 * (1e3 * 1e6) / (1e3 + 1e6);
    for _ in 0..3 {
        let v = tree.process(0.0).unwrap();
        assert_relative_eq!(f64::from(v), expected, max_relative = 1e-6);
    }

    let mut reversed = tree_from("I1 a 0 DC 1m\nR1 a 0 1k output\n", 48000.0);
    let v = reversed.process(0.0).unwrap();
    assert_relative_eq!(f64::from(v), -expected, max_relative = 1e-6);
}

#[test]
fn dc_input_source_scales_samples_by_its_voltage() {
    let netlist = "V1 in 0 DC 2 rs=0 input\nR1 in out 1k\nR2 out 0 1k output\n";
    let mut tree = tree_from(netlist, 48000.0);
    assert_relative_eq!(tree.process(1.0).unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(tree.process(0.5).unwrap(), 0.5, epsilon = 1e-6);
    assert_relative_eq!(tree.process(-1.0).unwrap(), -1.0, epsilon = 1e-6);
}

#[test]
fn circuit_without_input_is_not_ready_for_audio() {
    let mut sim = built(
        "V1 in 0 DC 1\nR1 in out 1k\nC1 out 0 100n output\n",
        SimulationConfig::new(),
    );
    assert!(!sim.prepare_for_audio());
    assert!(matches!(
        sim.take_audio_tree(),
        Err(WdfError::NotReady { .. })
    ));

    let mut sim = built(&rc_lowpass("100n"), SimulationConfig::new());
    assert!(sim.prepare_for_audio());
    assert!(sim.take_audio_tree().is_ok());
}

#[test]
fn failed_nonlinear_solve_holds_previous_output() {
    let netlist = "V1 in 0 AC 5 rs=1 input\nR1 in out 1k\nDP1 out 0 output\n";
    let starved = || {
        SimulationConfig::new()
            .with_sample_rate(48000.0)
            .with_max_iterations(1)
    };
    let input = sine(200.0, 48000.0, 240);

    let mut sim = built(netlist, starved());
    let mut previous = 0.0f32;
    let mut degraded = 0;
    for &x in &input {
        let y = sim.process(x);
        if sim.degraded_samples() > degraded {
            assert_eq!(y, previous, "degraded sample did not hold the output");
            degraded = sim.degraded_samples();
        }
        previous = y;
    }
    assert!(degraded > 0);

    let tree = built(netlist, starved()).take_audio_tree().unwrap();
    let (publisher, mut processor) = realtime::channel(Some(tree));
    let mut output = vec![0.0f32; input.len()];
    processor.process_block(&input, &mut output);
    assert_eq!(publisher.faults(), degraded as u64);
    assert!(output.iter().all(|y| y.is_finite()));
}
