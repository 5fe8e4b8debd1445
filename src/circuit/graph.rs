//! Circuit graph structure.

use std::collections::HashMap;

use super::types::{ComponentOptions, EdgeId, VertexId};
use crate::components::Component;
use crate::error::{Result, WdfError};

/// An electrical node, identified by its name.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub name: String,
}

/// A component placed in the circuit.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Unique component id (e.g. `R1`)
    pub id: String,
    /// Component kind and values
    pub component: Component,
    /// Input/output flags
    pub options: ComponentOptions,
    /// Connected vertices `(positive, negative)`, `None` until connected
    pub endpoints: Option<(VertexId, VertexId)>,
}

impl Edge {
    /// The connected vertices, if the edge has been connected.
    pub fn ends(&self) -> Option<(VertexId, VertexId)> {
        self.endpoints
    }
}

/// A circuit under assembly: named vertices and typed, valued edges.
///
/// The graph is build-once. There are no removal operations; a changed
/// circuit is a new graph.
#[derive(Debug, Clone, Default)]
pub struct CircuitGraph {
    vertices: Vec<Vertex>,
    vertex_map: HashMap<String, VertexId>,
    edges: Vec<Edge>,
    edge_map: HashMap<String, EdgeId>,
}

impl CircuitGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named vertex.
    pub fn add_vertex(&mut self, name: &str) -> Result<VertexId> {
        if self.vertex_map.contains_key(name) {
            return Err(WdfError::DuplicateId {
                id: name.to_string(),
            });
        }
        Ok(self.insert_vertex(name))
    }

    /// Add a component connected between two existing vertices.
    pub fn add_edge(
        &mut self,
        id: &str,
        component: Component,
        options: ComponentOptions,
        vertex_a: &str,
        vertex_b: &str,
    ) -> Result<EdgeId> {
        if self.edge_map.contains_key(id) {
            return Err(WdfError::DuplicateId { id: id.to_string() });
        }
        let a = self.require_vertex(vertex_a)?;
        let b = self.require_vertex(vertex_b)?;

        let edge = self.create_edge(id, component, options)?;
        self.edges[edge.0].endpoints = Some((a, b));
        Ok(edge)
    }

    /// Register a component that is not connected yet.
    ///
    /// The component is validated here so that bad values surface at
    /// assembly time rather than during tree construction.
    pub fn create_edge(
        &mut self,
        id: &str,
        component: Component,
        options: ComponentOptions,
    ) -> Result<EdgeId> {
        if self.edge_map.contains_key(id) {
            return Err(WdfError::DuplicateId { id: id.to_string() });
        }
        component.validate(id)?;
        if options.input && !component.is_source() {
            return Err(WdfError::invalid_component(
                id,
                "only sources can be marked as the audio input",
            ));
        }

        let edge_id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id: id.to_string(),
            component,
            options,
            endpoints: None,
        });
        self.edge_map.insert(id.to_string(), edge_id);
        Ok(edge_id)
    }

    /// Connect a previously created edge between two vertices.
    ///
    /// Vertices are created on first use.
    pub fn connect(&mut self, vertex_a: &str, vertex_b: &str, edge: &str) -> Result<()> {
        let edge_id = self.find_edge(edge).ok_or_else(|| WdfError::UnknownEdge {
            edge: edge.to_string(),
        })?;
        if self.edges[edge_id.0].endpoints.is_some() {
            return Err(WdfError::DuplicateId {
                id: edge.to_string(),
            });
        }

        let a = self.vertex_or_insert(vertex_a);
        let b = self.vertex_or_insert(vertex_b);
        self.edges[edge_id.0].endpoints = Some((a, b));
        Ok(())
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All vertices in insertion order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get a vertex by index.
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    /// Get an edge by index.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    /// Find a vertex by name.
    pub fn find_vertex(&self, name: &str) -> Option<VertexId> {
        self.vertex_map.get(name).copied()
    }

    /// Find an edge by component id.
    pub fn find_edge(&self, id: &str) -> Option<EdgeId> {
        self.edge_map.get(id).copied()
    }

    /// Get the name of a vertex.
    pub fn vertex_name(&self, id: VertexId) -> &str {
        &self.vertices[id.0].name
    }

    /// Number of connected edge ends at a vertex (a self-loop counts twice).
    pub fn degree(&self, vertex: VertexId) -> usize {
        self.edges
            .iter()
            .filter_map(|e| e.endpoints)
            .map(|(a, b)| usize::from(a == vertex) + usize::from(b == vertex))
            .sum()
    }

    /// Number of nonlinear components.
    pub fn nonlinear_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| e.component.is_nonlinear())
            .count()
    }

    fn require_vertex(&self, name: &str) -> Result<VertexId> {
        self.find_vertex(name).ok_or_else(|| WdfError::UnknownVertex {
            vertex: name.to_string(),
        })
    }

    fn vertex_or_insert(&mut self, name: &str) -> VertexId {
        match self.find_vertex(name) {
            Some(id) => id,
            None => self.insert_vertex(name),
        }
    }

    fn insert_vertex(&mut self, name: &str) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex {
            name: name.to_string(),
        });
        self.vertex_map.insert(name.to_string(), id);
        id
    }
}
