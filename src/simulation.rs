//! The construction pipeline: graph → topology tree → WDF tree.

use crate::circuit::{CircuitGraph, ComponentOptions, EdgeId};
use crate::components::{Component, SourceWaveform, DEFAULT_AC_FREQUENCY, DEFAULT_SOURCE_RESISTANCE};
use crate::dsl::{self, CircuitAst};
use crate::error::{Result, WdfError};
use crate::progress::{CancellationToken, Milestone, NoProgress, ProgressObserver};
use crate::solver::{NewtonRaphson, CONVERGENCE_TOLERANCE, MAX_ITERATIONS};
use crate::topology::{self, TopologyTree};
use crate::wdf::{self, WdfTree};
use crate::DEFAULT_SAMPLE_RATE;

/// Duration of the wave generated by [`Simulation::prepare_wave`], in seconds.
pub const WAVE_DURATION: f64 = 1.0;

/// Configuration for building and running a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Maximum Newton-Raphson iterations per nonlinear solve
    pub max_iterations: usize,
    /// Convergence tolerance for Newton-Raphson (volts)
    pub tolerance: f64,
    /// Series resistance for netlist sources that do not give `rs=`
    pub source_resistance: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_iterations: MAX_ITERATIONS,
            tolerance: CONVERGENCE_TOLERANCE,
            source_resistance: DEFAULT_SOURCE_RESISTANCE,
        }
    }
}

impl SimulationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sample rate in Hz.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance (in volts).
    ///
    /// Higher tolerance = faster convergence but less accuracy.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the default source series resistance (ohms).
    pub fn with_source_resistance(mut self, resistance: f64) -> Self {
        self.source_resistance = resistance;
        self
    }

    /// Sampling period `T = 1 / fs`.
    pub fn sampling_period(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Newton solver with this configuration's budget.
    pub fn newton(&self) -> NewtonRaphson {
        NewtonRaphson {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }

    /// Check that all parameters are usable.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(WdfError::InvalidSimulationParam { message });
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return fail(format!("sample rate must be positive, got {}", self.sample_rate));
        }
        if self.max_iterations == 0 {
            return fail("max iterations must be at least 1".to_string());
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return fail(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if !self.source_resistance.is_finite() || self.source_resistance < 0.0 {
            return fail(format!(
                "source resistance must be non-negative, got {}",
                self.source_resistance
            ));
        }
        Ok(())
    }
}

/// Owner of one circuit's construction state and offline processing.
///
/// Construction runs in stages, each gated on the previous one:
/// `create_graph` → `create_edge`/`connect_vertex` → `create_tree` →
/// `create_wdf_tree` → `prepare_wave`/`process`. Milestones go to the
/// injected [`ProgressObserver`]; the [`CancellationToken`] is checked
/// between stages.
pub struct Simulation {
    config: SimulationConfig,
    graph: Option<CircuitGraph>,
    topology: Option<TopologyTree>,
    tree: Option<WdfTree>,
    observer: Box<dyn ProgressObserver + Send>,
    cancel: CancellationToken,
    input_wave: Option<(f64, f64)>,
    wave: Vec<f32>,
    output: Vec<f32>,
    cursor: usize,
    degraded: usize,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("graph", &self.graph.is_some())
            .field("topology", &self.topology.is_some())
            .field("tree", &self.tree.is_some())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Simulation {
    /// Create an empty simulation.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            graph: None,
            topology: None,
            tree: None,
            observer: Box::new(NoProgress),
            cancel: CancellationToken::new(),
            input_wave: None,
            wave: Vec::new(),
            output: Vec::new(),
            cursor: 0,
            degraded: 0,
        }
    }

    /// Attach a progress observer.
    pub fn with_observer(mut self, observer: impl ProgressObserver + Send + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Build a simulation straight from a parsed netlist.
    ///
    /// A `.samplerate` directive overrides the configured rate.
    pub fn from_ast(ast: &CircuitAst, config: SimulationConfig) -> Result<Self> {
        let config = match ast.sample_rate {
            Some(rate) => config.with_sample_rate(rate),
            None => config,
        };
        config.validate()?;
        let graph = dsl::build_graph(ast, config.source_resistance)?;
        let mut sim = Self::new(config);
        sim.graph = Some(graph);
        Ok(sim)
    }

    /// Run the remaining stages with the configured sample rate.
    pub fn build(&mut self) -> Result<()> {
        self.create_tree()?;
        self.create_wdf_tree(self.config.sampling_period())
    }

    /// Token that cancels construction at the next stage boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&CircuitGraph> {
        self.graph.as_ref()
    }

    pub fn topology(&self) -> Option<&TopologyTree> {
        self.topology.as_ref()
    }

    pub fn tree(&self) -> Option<&WdfTree> {
        self.tree.as_ref()
    }

    /// Give up ownership of the built tree (for publishing to an audio
    /// thread).
    pub fn take_tree(&mut self) -> Option<WdfTree> {
        self.tree.take()
    }

    /// Take the tree for playback. Fails with `NotReady` unless
    /// [`prepare_for_audio`](Self::prepare_for_audio) holds, leaving the
    /// tree in place.
    pub fn take_audio_tree(&mut self) -> Result<WdfTree> {
        if !self.prepare_for_audio() {
            return Err(WdfError::NotReady { stage: "WDF tree" });
        }
        self.tree.take().ok_or(WdfError::NotReady { stage: "WDF tree" })
    }

    /// Start a new, empty circuit. Discards all later stages.
    pub fn create_graph(&mut self) {
        self.graph = Some(CircuitGraph::new());
        self.topology = None;
        self.tree = None;
        self.clear_wave();
    }

    /// Add an unconnected component.
    pub fn create_edge(
        &mut self,
        component: Component,
        options: ComponentOptions,
        id: &str,
    ) -> Result<EdgeId> {
        let graph = self.graph_mut()?;
        let edge = graph.create_edge(id, component, options)?;
        self.invalidate();
        Ok(edge)
    }

    /// Connect a component between two vertices, creating them as needed.
    pub fn connect_vertex(&mut self, vertex_a: &str, vertex_b: &str, edge_id: &str) -> Result<()> {
        self.graph_mut()?.connect(vertex_a, vertex_b, edge_id)?;
        self.invalidate();
        Ok(())
    }

    /// Decompose the graph.
    pub fn create_tree(&mut self) -> Result<&TopologyTree> {
        self.check_cancelled()?;
        let graph = self.graph.as_ref().ok_or(WdfError::NotReady { stage: "graph" })?;
        self.observer.milestone(Milestone::GraphBuilt);
        tracing::info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            nonlinear = graph.nonlinear_count(),
            "decomposing circuit"
        );

        let topology = topology::decompose(graph)?;
        self.check_cancelled()?;
        self.tree = None;
        self.observer.milestone(Milestone::TreeBuilt);
        Ok(self.topology.insert(topology))
    }

    /// Build the WDF tree for sampling period `sampling_period` (seconds).
    pub fn create_wdf_tree(&mut self, sampling_period: f64) -> Result<()> {
        self.check_cancelled()?;
        let graph = self.graph.as_ref().ok_or(WdfError::NotReady { stage: "graph" })?;
        let topology = self
            .topology
            .as_ref()
            .ok_or(WdfError::NotReady { stage: "topology tree" })?;

        let mut tree = wdf::build(graph, topology, sampling_period, self.config.newton())?;
        if let Some((frequency, voltage)) = self.input_wave {
            tree.set_input_waveform(frequency, voltage);
        }
        self.check_cancelled()?;

        self.tree = Some(tree);
        self.clear_wave();
        self.observer.milestone(Milestone::WdfTreeBuilt);
        Ok(())
    }

    /// Set frequency (Hz) and amplitude (V) of the input source, used by
    /// [`prepare_wave`](Self::prepare_wave).
    pub fn set_input_frequency(&mut self, frequency: f64, voltage: f64) {
        self.input_wave = Some((frequency, voltage));
        if let Some(tree) = &mut self.tree {
            tree.set_input_waveform(frequency, voltage);
        }
    }

    /// Generate one second of unit sine input at the input frequency, reset
    /// the tree, and rewind offline processing.
    pub fn prepare_wave(&mut self) -> Result<()> {
        self.check_cancelled()?;
        let frequency = self.input_frequency();
        let tree = self
            .tree
            .as_mut()
            .ok_or(WdfError::NotReady { stage: "WDF tree" })?;
        tree.reset();

        let t = tree.sampling_period();
        let len = (WAVE_DURATION / t).round() as usize;
        let step = std::f64::consts::TAU * frequency * t;
        self.wave = (0..len).map(|n| (step * n as f64).sin() as f32).collect();
        self.output = Vec::with_capacity(len);
        self.cursor = 0;
        self.degraded = 0;

        tracing::debug!(frequency, samples = len, "test wave prepared");
        self.observer.milestone(Milestone::WavePrepared);
        Ok(())
    }

    /// Process the next sample of the prepared wave.
    ///
    /// Returns `false` once all samples have been produced, or when no wave
    /// is prepared.
    pub fn get_next_sample(&mut self, value: &mut f32) -> bool {
        let (Some(tree), Some(&x)) = (self.tree.as_mut(), self.wave.get(self.cursor)) else {
            return false;
        };
        let (y, degraded) = tree.process_holding(x);
        if degraded {
            self.degraded += 1;
        }
        self.output.push(y);
        self.cursor += 1;
        *value = y;
        true
    }

    /// Outputs produced so far by [`get_next_sample`](Self::get_next_sample).
    pub fn output_samples(&self) -> &[f32] {
        &self.output
    }

    /// Samples of the prepared wave.
    pub fn wave_samples(&self) -> &[f32] {
        &self.wave
    }

    /// Samples that held the previous output after a nonlinear fault.
    pub fn degraded_samples(&self) -> usize {
        self.degraded
    }

    /// Process one live sample. Without a tree the sample passes through.
    pub fn process(&mut self, sample: f32) -> f32 {
        match &mut self.tree {
            Some(tree) => {
                let (y, degraded) = tree.process_holding(sample);
                if degraded {
                    self.degraded += 1;
                }
                y
            }
            None => sample,
        }
    }

    /// Whether a tree is built and numerically sound.
    pub fn prepare_for_audio(&self) -> bool {
        self.tree.as_ref().is_some_and(WdfTree::is_ready)
    }

    fn input_frequency(&self) -> f64 {
        if let Some((frequency, _)) = self.input_wave {
            return frequency;
        }
        let Some(graph) = &self.graph else {
            return DEFAULT_AC_FREQUENCY;
        };
        let ac_frequency = |e: &&crate::circuit::Edge| match e.component {
            Component::VoltageSource(v) => match v.waveform {
                SourceWaveform::Ac { frequency, .. } => Some(frequency),
                SourceWaveform::Dc { .. } => None,
            },
            _ => None,
        };
        let edges = graph.edges();
        edges
            .iter()
            .filter(|e| e.options.input)
            .find_map(|e| ac_frequency(&e))
            .or_else(|| edges.iter().find_map(|e| ac_frequency(&e)))
            .unwrap_or(DEFAULT_AC_FREQUENCY)
    }

    fn graph_mut(&mut self) -> Result<&mut CircuitGraph> {
        self.graph.as_mut().ok_or(WdfError::NotReady { stage: "graph" })
    }

    fn invalidate(&mut self) {
        self.topology = None;
        self.tree = None;
        self.clear_wave();
    }

    fn clear_wave(&mut self) {
        self.wave.clear();
        self.output.clear();
        self.cursor = 0;
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::info!("construction cancelled");
            Err(WdfError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Capacitor, Resistor, VoltageSource};
    use std::sync::{Arc, Mutex};

    fn rc_simulation() -> Simulation {
        let mut sim = Simulation::default();
        sim.create_graph();
        sim.create_edge(
            Component::VoltageSource(VoltageSource::ac(440.0, 1.0)),
            ComponentOptions::input(),
            "V1",
        )
        .unwrap();
        sim.create_edge(Component::Resistor(Resistor::new(1e3)), ComponentOptions::default(), "R1")
            .unwrap();
        sim.create_edge(
            Component::Capacitor(Capacitor::new(100e-9)),
            ComponentOptions::output(),
            "C1",
        )
        .unwrap();
        sim.connect_vertex("in", "0", "V1").unwrap();
        sim.connect_vertex("in", "out", "R1").unwrap();
        sim.connect_vertex("out", "0", "C1").unwrap();
        sim
    }

    #[test]
    fn test_stages_are_gated() {
        let mut sim = Simulation::default();
        assert!(matches!(
            sim.create_tree(),
            Err(WdfError::NotReady { stage: "graph" })
        ));
        sim.create_graph();
        assert!(matches!(
            sim.create_wdf_tree(1.0 / 44100.0),
            Err(WdfError::NotReady { .. })
        ));
        assert!(matches!(sim.prepare_wave(), Err(WdfError::NotReady { .. })));
        assert!(!sim.prepare_for_audio());
        assert_eq!(sim.process(0.25), 0.25);
    }

    #[test]
    fn test_get_next_sample_runs_out() {
        let mut sim = rc_simulation();
        sim.build().unwrap();
        assert!(sim.prepare_for_audio());
        sim.set_input_frequency(1000.0, 0.5);
        sim.prepare_wave().unwrap();

        let n = sim.wave_samples().len();
        assert_eq!(n, 44100);
        let mut value = 0.0;
        let mut count = 0;
        while sim.get_next_sample(&mut value) {
            count += 1;
        }
        assert_eq!(count, n);
        assert!(!sim.get_next_sample(&mut value));
        assert!(!sim.get_next_sample(&mut value));
        assert_eq!(sim.output_samples().len(), n);
        assert_eq!(sim.degraded_samples(), 0);
    }

    #[test]
    fn test_milestones_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut sim = rc_simulation().with_observer(move |m: Milestone| sink.lock().unwrap().push(m));
        sim.build().unwrap();
        sim.prepare_wave().unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Milestone::GraphBuilt,
                Milestone::TreeBuilt,
                Milestone::WdfTreeBuilt,
                Milestone::WavePrepared
            ]
        );
    }

    #[test]
    fn test_audio_tree_needs_input() {
        let mut sim = Simulation::default();
        sim.create_graph();
        sim.create_edge(
            Component::VoltageSource(VoltageSource::dc(1.0)),
            ComponentOptions::default(),
            "V1",
        )
        .unwrap();
        sim.create_edge(Component::Resistor(Resistor::new(1e3)), ComponentOptions::output(), "R1")
            .unwrap();
        sim.connect_vertex("a", "0", "V1").unwrap();
        sim.connect_vertex("a", "0", "R1").unwrap();
        sim.build().unwrap();

        assert!(!sim.prepare_for_audio());
        assert!(matches!(
            sim.take_audio_tree(),
            Err(WdfError::NotReady { stage: "WDF tree" })
        ));
        assert!(sim.tree().is_some());

        let mut sim = rc_simulation();
        sim.build().unwrap();
        assert!(sim.take_audio_tree().is_ok());
        assert!(sim.tree().is_none());
    }

    #[test]
    fn test_cancellation() {
        let mut sim = rc_simulation();
        let token = sim.cancellation_token();
        token.cancel();
        assert!(matches!(sim.build(), Err(WdfError::Cancelled)));
        assert!(sim.tree().is_none());
        token.reset();
        sim.build().unwrap();
        assert!(sim.tree().is_some());
    }

    #[test]
    fn test_edit_invalidates_tree() {
        let mut sim = rc_simulation();
        sim.build().unwrap();
        sim.create_edge(Component::Resistor(Resistor::new(1.0)), ComponentOptions::default(), "R2")
            .unwrap();
        assert!(sim.tree().is_none());
        assert!(sim.topology().is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulationConfig::new().validate().is_ok());
        assert!(SimulationConfig::new().with_sample_rate(0.0).validate().is_err());
        assert!(SimulationConfig::new().with_max_iterations(0).validate().is_err());
        assert!(SimulationConfig::new().with_tolerance(-1.0).validate().is_err());
    }
}
