//! Circuit graph validation.

use std::collections::VecDeque;

use crate::error::{Result, WdfError};

use super::CircuitGraph;

/// Validate a graph before decomposition.
///
/// Checks:
/// - The graph has at least one edge
/// - Every edge is connected to two vertices, and not to the same one twice
/// - Every vertex is reachable from the first vertex
pub fn validate_graph(graph: &CircuitGraph) -> Result<()> {
    if graph.edge_count() == 0 {
        if graph.vertex_count() > 1 {
            return Err(WdfError::DisconnectedGraph {
                vertex: graph.vertices()[1].name.clone(),
            });
        }
        return Err(WdfError::decomposition("circuit has no components"));
    }

    for edge in graph.edges() {
        match edge.ends() {
            None => {
                return Err(WdfError::decomposition(format!(
                    "component '{}' is not connected",
                    edge.id
                )));
            }
            Some((a, b)) if a == b => {
                return Err(WdfError::decomposition(format!(
                    "component '{}' is shorted: both terminals on vertex '{}'",
                    edge.id,
                    graph.vertex_name(a)
                )));
            }
            Some(_) => {}
        }
    }

    check_connected(graph)
}

/// Breadth-first reachability from vertex 0.
pub fn check_connected(graph: &CircuitGraph) -> Result<()> {
    let n = graph.vertex_count();
    if n == 0 {
        return Ok(());
    }

    let mut adjacency = vec![Vec::new(); n];
    for (a, b) in graph.edges().iter().filter_map(|e| e.ends()) {
        adjacency[a.0].push(b.0);
        adjacency[b.0].push(a.0);
    }

    let mut seen = vec![false; n];
    let mut queue = VecDeque::from([0usize]);
    seen[0] = true;
    while let Some(v) = queue.pop_front() {
        for &w in &adjacency[v] {
            if !seen[w] {
                seen[w] = true;
                queue.push_back(w);
            }
        }
    }

    match seen.iter().position(|&s| !s) {
        Some(v) => Err(WdfError::DisconnectedGraph {
            vertex: graph.vertices()[v].name.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentOptions;
    use crate::components::{Component, Resistor};

    #[test]
    fn test_two_vertices_no_edges_is_disconnected() {
        let mut g = CircuitGraph::new();
        g.add_vertex("a").unwrap();
        g.add_vertex("b").unwrap();
        assert!(matches!(
            validate_graph(&g),
            Err(WdfError::DisconnectedGraph { .. })
        ));
    }

    #[test]
    fn test_island_is_disconnected() {
        let mut g = CircuitGraph::new();
        for v in ["a", "b", "c", "d"] {
            g.add_vertex(v).unwrap();
        }
        let r = || Component::Resistor(Resistor::new(100.0));
        g.add_edge("R1", r(), ComponentOptions::default(), "a", "b")
            .unwrap();
        g.add_edge("R2", r(), ComponentOptions::default(), "c", "d")
            .unwrap();
        match validate_graph(&g) {
            Err(WdfError::DisconnectedGraph { vertex }) => assert_eq!(vertex, "c"),
            other => panic!("expected disconnected graph, got {other:?}"),
        }
    }

    #[test]
    fn test_unconnected_edge_rejected() {
        let mut g = CircuitGraph::new();
        g.create_edge(
            "R1",
            Component::Resistor(Resistor::new(1.0)),
            ComponentOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            validate_graph(&g),
            Err(WdfError::Decomposition { .. })
        ));
    }
}
