//! Core types for circuit graph representation.

use std::fmt;

/// Index of a vertex (electrical node) in a [`CircuitGraph`](super::CircuitGraph).
///
/// Vertices are numbered in insertion order, which makes every
/// decomposition decision reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index of an edge (component) in a [`CircuitGraph`](super::CircuitGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Per-component flags carried over from the schematic editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentOptions {
    /// This source receives the audio signal.
    pub input: bool,
    /// The voltage across this component is the filter output.
    pub output: bool,
}

impl ComponentOptions {
    /// Options for the audio input source.
    pub fn input() -> Self {
        Self {
            input: true,
            output: false,
        }
    }

    /// Options for the output probe.
    pub fn output() -> Self {
        Self {
            input: false,
            output: true,
        }
    }
}
