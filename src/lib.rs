//! # Electree Core
//!
//! Wave Digital Filter simulation of analog circuits for real-time audio.
//!
//! A circuit (resistors, capacitors, inductors, sources and diodes) is
//! described as a graph, decomposed into a tree of series, parallel and
//! rigid connections, and turned into a tree of wave-domain adaptors that
//! processes one audio sample at a time.
//!
//! ## Architecture
//!
//! - [`dsl`] - Parser for the netlist language
//! - [`circuit`] - Circuit graph and its validation
//! - [`components`] - Component values (resistors, capacitors, diodes, ...)
//! - [`topology`] - Series/parallel/rigid decomposition of the graph
//! - [`wdf`] - Adaptors, leaves and the per-sample wave processor
//! - [`solver`] - Dense LU solve and Newton iteration used during build and
//!   for nonlinear leaves
//! - [`simulation`] - The staged build pipeline with progress milestones
//! - [`batch`] - Offline processing of whole buffers
//! - [`realtime`] - Handoff of built trees to an audio thread
//! - [`audio`] - Decoder and sink seams, raw PCM streams
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - \
//!   | electree filter circuit.cir --sample-rate 48000 \
//!   | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use electree_core::{dsl, Simulation, SimulationConfig};
//!
//! let ast = dsl::parse("V1 in 0 AC 1 input\nR1 in out 1k\nC1 out 0 100n output")?;
//! let mut sim = Simulation::from_ast(&ast, SimulationConfig::new().with_sample_rate(48000.0))?;
//! sim.build()?;
//! let y = sim.process(0.5);
//! # let _ = y;
//! # Ok::<(), electree_core::WdfError>(())
//! ```
//!
//! ## Wave Digital Filters
//!
//! Every component port is described by an incident wave `a = v + R·i` and
//! a reflected wave `b = v − R·i` for a chosen port resistance `R`. Reactive
//! elements are discretised with the bilinear transform, which turns them
//! into one-sample delays. Adaptors implement Kirchhoff's laws on waves. The
//! port resistances are picked so that no delay-free loop appears, which
//! makes each sample a single pass up and down the tree.

pub mod audio;
pub mod batch;
pub mod circuit;
pub mod components;
pub mod dsl;
pub mod error;
pub mod progress;
pub mod realtime;
pub mod simulation;
pub mod solver;
pub mod topology;
pub mod wdf;

pub use circuit::{CircuitGraph, ComponentOptions};
pub use components::Component;
pub use error::{Result, WdfError};
pub use progress::{CancellationToken, Milestone, ProgressObserver};
pub use simulation::{Simulation, SimulationConfig};
pub use topology::TopologyTree;
pub use wdf::WdfTree;

#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmWdfFilter;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.02585;
