//! Circuit graph representation and validation.
//!
//! A [`CircuitGraph`] holds named vertices and component edges. It is a pure
//! data structure: assembly checks ids and endpoints, everything else
//! happens in [`topology`](crate::topology).

mod graph;
mod types;
mod validate;

pub use graph::{CircuitGraph, Edge, Vertex};
pub use types::*;
pub use validate::{check_connected, validate_graph};
