//! Electree - Wave Digital Filter circuit simulator
//!
//! # Usage
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - \
//!   | electree filter circuit.cir --sample-rate 48000 \
//!   | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```

use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use electree_core::{
    audio::{AudioDecoder, AudioSink, PcmReader, PcmWriter, BLOCK_SIZE},
    batch, dsl,
    error::Result,
    progress::LogProgress,
    realtime, Simulation, SimulationConfig,
};

/// Wave Digital Filter simulation of analog circuits
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter raw f32le mono PCM from stdin to stdout
    Filter {
        #[command(flatten)]
        circuit: CircuitArgs,

        /// Output gain
        #[arg(long, default_value_t = 1.0)]
        volume: f32,

        /// Pass the input through unfiltered
        #[arg(long)]
        bypass: bool,

        /// Read all input before processing instead of streaming blocks
        #[arg(long)]
        offline: bool,
    },

    /// Run one second of the test sine and print the output samples
    Sine {
        #[command(flatten)]
        circuit: CircuitArgs,

        /// Sine frequency in Hz (defaults to the input source's)
        #[arg(long)]
        frequency: Option<f64>,

        /// Sine amplitude in volts
        #[arg(long, default_value_t = 1.0)]
        amplitude: f64,
    },

    /// Print the topology and WDF trees
    Inspect {
        #[command(flatten)]
        circuit: CircuitArgs,
    },
}

#[derive(Args, Debug)]
struct CircuitArgs {
    /// Path to the netlist file
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Sample rate in Hz (overrides `.samplerate`)
    #[arg(short, long)]
    sample_rate: Option<f64>,

    /// Maximum Newton-Raphson iterations per nonlinear solve
    #[arg(long, default_value_t = electree_core::solver::MAX_ITERATIONS)]
    max_iterations: usize,

    /// Newton-Raphson convergence tolerance in volts
    #[arg(long, default_value_t = electree_core::solver::CONVERGENCE_TOLERANCE)]
    tolerance: f64,
}

impl CircuitArgs {
    fn simulation(&self) -> Result<Simulation> {
        let mut ast = dsl::parse_file(&self.circuit_file)?;
        if let Some(rate) = self.sample_rate {
            ast.sample_rate = Some(rate);
        }
        if let Some(title) = &ast.title {
            tracing::info!(title = %title, "loaded circuit");
        }
        let config = SimulationConfig::new()
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance);
        let mut sim = Simulation::from_ast(&ast, config)?.with_observer(LogProgress);
        sim.build()?;
        Ok(sim)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Filter {
            circuit,
            volume,
            bypass,
            offline,
        } => filter(&circuit, volume, bypass, offline),
        Command::Sine {
            circuit,
            frequency,
            amplitude,
        } => sine(&circuit, frequency, amplitude),
        Command::Inspect { circuit } => inspect(&circuit),
    }
}

fn filter(args: &CircuitArgs, volume: f32, bypass: bool, offline: bool) -> Result<()> {
    let mut sim = args.simulation()?;
    let sample_rate = sim.config().sample_rate;
    let tree = sim.take_audio_tree().inspect_err(|_| {
        tracing::error!("circuit has no input source or non-finite coefficients");
    })?;

    let mut decoder = PcmReader::new(BufReader::new(io::stdin().lock()), sample_rate);
    let mut sink = PcmWriter::new(BufWriter::new(io::stdout().lock()));

    if offline && !bypass {
        let mut tree = tree;
        let report = batch::run(&mut tree, &mut decoder, &mut sink, &mut LogProgress)?;
        tracing::info!(samples = report.samples, degraded = report.degraded, "done");
        return Ok(());
    }

    let (publisher, mut processor) = realtime::channel(Some(tree));
    publisher.set_volume(volume);
    publisher.set_filter_enabled(!bypass);

    let mut input = [0.0f32; BLOCK_SIZE];
    let mut output = [0.0f32; BLOCK_SIZE];
    let mut total = 0usize;
    loop {
        let n = decoder.read_block(&mut input)?;
        if n == 0 {
            break;
        }
        processor.process_block(&input[..n], &mut output[..n]);
        sink.write_block(&output[..n])?;
        total += n;
    }
    sink.flush()?;

    tracing::info!(samples = total, faults = publisher.faults(), "done");
    Ok(())
}

fn sine(args: &CircuitArgs, frequency: Option<f64>, amplitude: f64) -> Result<()> {
    let mut sim = args.simulation()?;
    if let Some(frequency) = frequency {
        sim.set_input_frequency(frequency, amplitude);
    }
    sim.prepare_wave()?;

    let mut out = BufWriter::new(io::stdout().lock());
    let mut sample = 0.0f32;
    while sim.get_next_sample(&mut sample) {
        writeln!(out, "{sample}").map_err(write_error)?;
    }
    out.flush().map_err(write_error)?;

    if sim.degraded_samples() > 0 {
        tracing::warn!(degraded = sim.degraded_samples(), "nonlinear solve failed on some samples");
    }
    Ok(())
}

fn inspect(args: &CircuitArgs) -> Result<()> {
    let sim = args.simulation()?;
    let mut out = io::stdout().lock();
    let report = describe(&sim, &args.circuit_file);
    out.write_all(report.as_bytes()).map_err(write_error)
}

fn describe(sim: &Simulation, path: &Path) -> String {
    let mut text = format!("circuit: {}\n\ntopology:\n", path.display());
    if let (Some(graph), Some(topology)) = (sim.graph(), sim.topology()) {
        text.push_str(&topology.describe(graph));
    }
    text.push_str("\nwdf:\n");
    if let Some(tree) = sim.tree() {
        text.push_str(&tree.to_string());
    }
    text
}

fn write_error(e: io::Error) -> electree_core::WdfError {
    electree_core::WdfError::AudioOutputError {
        message: e.to_string(),
    }
}
