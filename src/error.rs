//! Error types for the Electree WDF simulator.
//!
//! This module provides a unified error type [`WdfError`] covering netlist
//! parsing, circuit assembly, topology decomposition, WDF tree construction
//! and sample evaluation.

use thiserror::Error;

/// Result type alias using [`WdfError`].
pub type Result<T> = std::result::Result<T, WdfError>;

/// Unified error type for all Electree operations.
#[derive(Error, Debug)]
pub enum WdfError {
    // ============ Netlist Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Unknown component prefix
    #[error("Unknown component type '{component_type}' at line {line}")]
    UnknownComponentType { component_type: String, line: usize },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by component '{component}'")]
    UndefinedModel { model: String, component: String },

    /// Duplicate model name
    #[error("Duplicate model name '{name}'")]
    DuplicateModel { name: String },

    // ============ Graph Assembly Errors ============
    /// A vertex or edge with this id already exists
    #[error("Duplicate id '{id}'")]
    DuplicateId { id: String },

    /// Edge endpoint is not a vertex of the graph
    #[error("Vertex '{vertex}' not found in circuit graph")]
    UnknownVertex { vertex: String },

    /// Edge referenced before it was created
    #[error("Edge '{edge}' not found in circuit graph")]
    UnknownEdge { edge: String },

    /// Component values out of their physical range
    #[error("Invalid component '{name}': {message}")]
    InvalidComponent { name: String, message: String },

    // ============ Decomposition Errors ============
    /// Some vertex cannot be reached from the rest of the circuit
    #[error("Circuit graph is disconnected: vertex '{vertex}' is unreachable")]
    DisconnectedGraph { vertex: String },

    /// Graph cannot be reduced to a single two-terminal tree
    #[error("Cannot decompose circuit: {message}")]
    Decomposition { message: String },

    // ============ WDF Build Errors ============
    /// Component kind has no wave-domain model in this position
    #[error("Component '{component}' ({kind}) is not supported: {message}")]
    UnsupportedComponent {
        component: String,
        kind: &'static str,
        message: String,
    },

    /// Nodal matrix of a rigid adaptor is singular
    #[error("Singular matrix - rigid connection has a short circuit or floating node")]
    SingularMatrix,

    // ============ Evaluation Errors ============
    /// Local Newton iteration of a nonlinear leaf did not converge
    #[error("Nonlinear solve did not converge after {iterations} iterations (residual: {residual:.2e})")]
    NonlinearConvergence { iterations: usize, residual: f64 },

    /// Operation called before the stage it depends on
    #[error("Simulation not ready: {stage} has not been built")]
    NotReady { stage: &'static str },

    /// Construction cancelled cooperatively between milestones
    #[error("Construction cancelled")]
    Cancelled,

    /// A previously published tree has not been picked up yet
    #[error("A tree swap is already pending")]
    SwapPending,

    /// The real-time processor was dropped
    #[error("Real-time processor is gone")]
    ProcessorGone,

    /// Input buffer holds no samples
    #[error("Input buffer is empty")]
    EmptyBuffer,

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading the netlist file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error reading audio input
    #[error("Audio input error: {message}")]
    AudioInputError { message: String },

    /// Error writing audio output
    #[error("Audio output error: {message}")]
    AudioOutputError { message: String },
}

impl WdfError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid component error
    pub fn invalid_component(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a decomposition error
    pub fn decomposition(message: impl Into<String>) -> Self {
        Self::Decomposition {
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::NonlinearConvergence {
            iterations,
            residual,
        }
    }

    /// Whether this error ends a construction attempt (as opposed to a
    /// recoverable per-sample fault).
    pub fn is_construction_error(&self) -> bool {
        !matches!(self, Self::NonlinearConvergence { .. })
    }
}
