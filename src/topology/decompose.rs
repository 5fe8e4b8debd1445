//! Bottom-up contraction of two-terminal subgraphs.

use super::{Child, NodeKind, TopologyNode, TopologyTree};
use crate::circuit::{validate_graph, CircuitGraph, EdgeId, VertexId};
use crate::error::{Result, WdfError};

/// A contracted subgraph acting as one edge between `ends`.
#[derive(Debug, Clone)]
struct Part {
    shape: Shape,
    ends: (VertexId, VertexId),
}

#[derive(Debug, Clone)]
enum Shape {
    Leaf(EdgeId),
    Series(Vec<(Part, bool)>),
    Parallel(Vec<(Part, bool)>),
    Rigid(Vec<Part>),
}

impl Part {
    fn leaf(edge: EdgeId, ends: (VertexId, VertexId)) -> Self {
        Self {
            shape: Shape::Leaf(edge),
            ends,
        }
    }

    fn touches(&self, v: VertexId) -> bool {
        self.ends.0 == v || self.ends.1 == v
    }

    fn other_end(&self, v: VertexId) -> VertexId {
        if self.ends.0 == v {
            self.ends.1
        } else {
            self.ends.0
        }
    }

    fn same_span(&self, other: &Part) -> bool {
        self.ends == other.ends || self.ends == (other.ends.1, other.ends.0)
    }
}

/// Decompose a circuit graph into a series/parallel/rigid tree.
///
/// Reduction order is fixed: a series contraction is always tried before a
/// parallel one, and within each rule the earliest vertex (for series) or
/// the earliest pair of edges (for parallel) in insertion order wins. The
/// same graph therefore always yields the same tree.
pub fn decompose(graph: &CircuitGraph) -> Result<TopologyTree> {
    validate_graph(graph)?;

    let root_edge = select_root(graph);
    let (s, t) = connected_ends(graph, root_edge)?;
    tracing::debug!(
        "decompose: root component '{}' between '{}' and '{}'",
        graph.edge(root_edge).id,
        graph.vertex_name(s),
        graph.vertex_name(t)
    );

    let root_leaf = Part::leaf(root_edge, (s, t));
    if graph.edge_count() == 1 {
        return Ok(layout(root_leaf, root_edge));
    }

    let mut parts = Vec::with_capacity(graph.edge_count() - 1);
    for index in 0..graph.edge_count() {
        let id = EdgeId(index);
        if id != root_edge {
            parts.push(Part::leaf(id, connected_ends(graph, id)?));
        }
    }

    loop {
        if contract_series(graph, &mut parts, (s, t)) {
            continue;
        }
        if contract_parallel(graph, &mut parts) {
            continue;
        }
        break;
    }

    check_closed(graph, &parts, root_edge, (s, t))?;

    let network = if parts.len() == 1 {
        parts.remove(0)
    } else {
        tracing::debug!("decompose: {} parts remain, forming rigid group", parts.len());
        Part {
            shape: Shape::Rigid(parts),
            ends: (s, t),
        }
    };

    let network_flip = network.ends != (s, t);
    let root = Part {
        shape: Shape::Parallel(vec![(root_leaf, false), (network, network_flip)]),
        ends: (s, t),
    };
    let tree = layout(root, root_edge);
    tracing::info!(
        nodes = tree.nodes.len(),
        leaves = tree.leaves().len(),
        "decomposition complete"
    );
    Ok(tree)
}

/// Pick the component the WDF tree is rooted at.
///
/// Preference: first nonlinear component, then the first source flagged as
/// audio input, then the first source, then the first component.
fn select_root(graph: &CircuitGraph) -> EdgeId {
    let edges = graph.edges();
    let pick = edges
        .iter()
        .position(|e| e.component.is_nonlinear())
        .or_else(|| {
            edges
                .iter()
                .position(|e| e.options.input && e.component.is_source())
        })
        .or_else(|| edges.iter().position(|e| e.component.is_source()))
        .unwrap_or(0);
    EdgeId(pick)
}

fn connected_ends(graph: &CircuitGraph, edge: EdgeId) -> Result<(VertexId, VertexId)> {
    graph.edge(edge).ends().ok_or_else(|| {
        WdfError::decomposition(format!("component '{}' is not connected", graph.edge(edge).id))
    })
}

/// Contract two parts meeting at an unprotected vertex of degree two.
fn contract_series(
    graph: &CircuitGraph,
    parts: &mut Vec<Part>,
    protected: (VertexId, VertexId),
) -> bool {
    for index in 0..graph.vertex_count() {
        let v = VertexId(index);
        if v == protected.0 || v == protected.1 {
            continue;
        }

        let mut incident = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.touches(v))
            .map(|(i, _)| i);
        let (i, j) = match (incident.next(), incident.next(), incident.next()) {
            (Some(i), Some(j), None) => (i, j),
            _ => continue,
        };

        let y1 = parts[i].other_end(v);
        let y2 = parts[j].other_end(v);
        if y1 == y2 {
            continue;
        }

        tracing::debug!(
            "decompose: series contraction at '{}'",
            graph.vertex_name(v)
        );
        let second = parts.remove(j);
        let first = parts.remove(i);

        // Chain y1 -> v -> y2
        let flip_first = first.ends != (y1, v);
        let flip_second = second.ends.0 != v;

        let mut children = Vec::new();
        push_flattened(&mut children, first, flip_first, Kind::Series);
        push_flattened(&mut children, second, flip_second, Kind::Series);
        parts.insert(
            i,
            Part {
                shape: Shape::Series(children),
                ends: (y1, y2),
            },
        );
        return true;
    }
    false
}

/// Contract the earliest pair of parts spanning the same two vertices.
fn contract_parallel(graph: &CircuitGraph, parts: &mut Vec<Part>) -> bool {
    for i in 0..parts.len() {
        for j in (i + 1)..parts.len() {
            if !parts[i].same_span(&parts[j]) {
                continue;
            }

            let ends = parts[i].ends;
            tracing::debug!(
                "decompose: parallel contraction between '{}' and '{}'",
                graph.vertex_name(ends.0),
                graph.vertex_name(ends.1)
            );
            let second = parts.remove(j);
            let first = parts.remove(i);
            let flip_second = second.ends != ends;

            let mut children = Vec::new();
            push_flattened(&mut children, first, false, Kind::Parallel);
            push_flattened(&mut children, second, flip_second, Kind::Parallel);
            parts.insert(
                i,
                Part {
                    shape: Shape::Parallel(children),
                    ends,
                },
            );
            return true;
        }
    }
    false
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Series,
    Parallel,
}

/// Append `part` to a series or parallel child list, splicing in its
/// children when it is already of the same kind.
fn push_flattened(children: &mut Vec<(Part, bool)>, part: Part, flip: bool, kind: Kind) {
    match (part.shape, kind) {
        (Shape::Series(inner), Kind::Series) | (Shape::Parallel(inner), Kind::Parallel) => {
            children.extend(inner.into_iter().map(|(p, f)| (p, f ^ flip)));
        }
        (shape, _) => children.push((
            Part {
                shape,
                ends: part.ends,
            },
            flip,
        )),
    }
}

/// After reduction, every remaining vertex must sit on a closed loop through
/// the root component.
fn check_closed(
    graph: &CircuitGraph,
    parts: &[Part],
    root_edge: EdgeId,
    (s, t): (VertexId, VertexId),
) -> Result<()> {
    let mut degree = vec![0usize; graph.vertex_count()];
    for p in parts {
        degree[p.ends.0 .0] += 1;
        degree[p.ends.1 .0] += 1;
    }

    if degree[s.0] == 0 || degree[t.0] == 0 {
        return Err(WdfError::decomposition(format!(
            "root component '{}' is not part of a closed loop",
            graph.edge(root_edge).id
        )));
    }

    // The root component adds one to s and t
    degree[s.0] += 1;
    degree[t.0] += 1;
    if let Some(v) = degree.iter().position(|&d| d == 1) {
        return Err(WdfError::decomposition(format!(
            "dangling connection at vertex '{}'",
            graph.vertex_name(VertexId(v))
        )));
    }
    Ok(())
}

/// Flatten the owned part tree into a pre-order arena.
fn layout(root: Part, root_edge: EdgeId) -> TopologyTree {
    let mut nodes = Vec::new();
    push_node(&mut nodes, root);
    TopologyTree { nodes, root_edge }
}

fn push_node(nodes: &mut Vec<TopologyNode>, part: Part) -> usize {
    let index = nodes.len();
    let (kind, inner): (NodeKind, Vec<(Part, bool)>) = match part.shape {
        Shape::Leaf(edge) => (NodeKind::Leaf(edge), Vec::new()),
        Shape::Series(children) => (NodeKind::Series, children),
        Shape::Parallel(children) => (NodeKind::Parallel, children),
        Shape::Rigid(children) => (
            NodeKind::Rigid {
                ports: children.iter().map(|p| p.ends).collect(),
            },
            children.into_iter().map(|p| (p, false)).collect(),
        ),
    };
    let own_edge = match kind {
        NodeKind::Leaf(edge) => vec![edge],
        _ => Vec::new(),
    };
    nodes.push(TopologyNode {
        kind,
        terminals: part.ends,
        children: Vec::with_capacity(inner.len()),
        edges: own_edge,
    });

    for (child, flip) in inner {
        let child_index = push_node(nodes, child);
        let child_edges = nodes[child_index].edges.clone();
        nodes[index].children.push(Child {
            node: child_index,
            flip,
        });
        nodes[index].edges.extend(child_edges);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentOptions;
    use crate::components::{Capacitor, Component, Resistor, VoltageSource};

    fn r(ohms: f64) -> Component {
        Component::Resistor(Resistor::new(ohms))
    }

    fn graph_of(vertices: &[&str], edges: &[(&str, Component, &str, &str)]) -> CircuitGraph {
        let mut g = CircuitGraph::new();
        for v in vertices {
            g.add_vertex(v).unwrap();
        }
        for (id, c, a, b) in edges {
            let options = if c.is_source() {
                ComponentOptions::input()
            } else {
                ComponentOptions::default()
            };
            g.add_edge(id, *c, options, a, b).unwrap();
        }
        g
    }

    #[test]
    fn test_series_rc() {
        let g = graph_of(
            &["in", "out", "0"],
            &[
                ("V1", Component::VoltageSource(VoltageSource::ac(440.0, 1.0)), "in", "0"),
                ("R1", r(1e3), "in", "out"),
                ("C1", Component::Capacitor(Capacitor::new(100e-9)), "out", "0"),
            ],
        );
        let tree = decompose(&g).unwrap();

        assert_eq!(tree.root().kind, NodeKind::Parallel);
        assert_eq!(tree.root_edge(), EdgeId(0));
        let net = tree.node(tree.root().children[1].node);
        assert_eq!(net.kind, NodeKind::Series);
        assert_eq!(net.children.len(), 2);
        assert!(net.children.iter().all(|c| tree.node(c.node).is_leaf()));
        assert_eq!(tree.leaves(), vec![EdgeId(0), EdgeId(1), EdgeId(2)]);
    }

    #[test]
    fn test_flattening() {
        // Four resistors in a ring with the source: one series node with
        // four leaves, not nested pairs
        let g = graph_of(
            &["a", "b", "c", "d", "0"],
            &[
                ("V1", Component::VoltageSource(VoltageSource::dc(1.0)), "a", "0"),
                ("R1", r(1.0), "a", "b"),
                ("R2", r(2.0), "c", "b"),
                ("R3", r(3.0), "c", "d"),
                ("R4", r(4.0), "d", "0"),
            ],
        );
        let tree = decompose(&g).unwrap();
        let net = tree.node(tree.root().children[1].node);
        assert_eq!(net.kind, NodeKind::Series);
        assert_eq!(net.children.len(), 4);
        // R2 runs c -> b against the chain direction
        let flips: Vec<bool> = net.children.iter().map(|c| c.flip).collect();
        let r2 = net
            .children
            .iter()
            .position(|c| tree.node(c.node).kind == NodeKind::Leaf(EdgeId(2)))
            .unwrap();
        assert_eq!(flips.iter().filter(|f| **f).count(), 1);
        assert!(flips[r2]);
    }

    #[test]
    fn test_bridge_is_rigid() {
        let g = graph_of(
            &["top", "l", "r", "0"],
            &[
                ("V1", Component::VoltageSource(VoltageSource::dc(1.0)), "top", "0"),
                ("R1", r(1.0), "top", "l"),
                ("R2", r(2.0), "top", "r"),
                ("R3", r(3.0), "l", "0"),
                ("R4", r(4.0), "r", "0"),
                ("R5", r(5.0), "l", "r"),
            ],
        );
        let tree = decompose(&g).unwrap();
        let net = tree.node(tree.root().children[1].node);
        match &net.kind {
            NodeKind::Rigid { ports } => assert_eq!(ports.len(), 5),
            other => panic!("expected rigid node, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_component() {
        let g = graph_of(
            &["in", "out", "0", "x"],
            &[
                ("V1", Component::VoltageSource(VoltageSource::dc(1.0)), "in", "0"),
                ("R1", r(1.0), "in", "0"),
                ("R2", r(1.0), "in", "x"),
            ],
        );
        // "out" is isolated
        assert!(matches!(
            decompose(&g),
            Err(WdfError::DisconnectedGraph { .. })
        ));

        let g = graph_of(
            &["in", "0", "x"],
            &[
                ("V1", Component::VoltageSource(VoltageSource::dc(1.0)), "in", "0"),
                ("R1", r(1.0), "in", "0"),
                ("R2", r(1.0), "in", "x"),
            ],
        );
        assert!(matches!(decompose(&g), Err(WdfError::Decomposition { .. })));
    }

    #[test]
    fn test_single_edge_is_lone_leaf() {
        let g = graph_of(&["a", "b"], &[("R1", r(1.0), "a", "b")]);
        let tree = decompose(&g).unwrap();
        assert!(tree.is_single_leaf());
    }

    #[test]
    fn test_root_prefers_nonlinear() {
        let g = graph_of(
            &["in", "out", "0"],
            &[
                ("V1", Component::VoltageSource(VoltageSource::dc(1.0)), "in", "0"),
                ("R1", r(1e3), "in", "out"),
                (
                    "D1",
                    Component::Diode(crate::components::Diode::default()),
                    "out",
                    "0",
                ),
            ],
        );
        let tree = decompose(&g).unwrap();
        assert_eq!(tree.root_edge(), EdgeId(2));
    }
}
