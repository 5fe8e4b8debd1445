//! Construction of a [`WdfTree`] from a topology tree.

use super::adaptor::{Adaptor, ParallelAdaptor, RigidAdaptor, SeriesAdaptor};
use super::leaf::Leaf;
use super::tree::{WdfNode, WdfTree};
use crate::circuit::{CircuitGraph, EdgeId};
use crate::components::{Component, SourceWaveform};
use crate::error::{Result, WdfError};
use crate::solver::NewtonRaphson;
use crate::topology::{NodeKind, TopologyTree};

/// Build a WDF tree for sampling period `sampling_period` (seconds).
pub fn build(
    graph: &CircuitGraph,
    topology: &TopologyTree,
    sampling_period: f64,
    newton: NewtonRaphson,
) -> Result<WdfTree> {
    if !sampling_period.is_finite() || sampling_period <= 0.0 {
        return Err(WdfError::InvalidSimulationParam {
            message: format!("sampling period must be positive, got {sampling_period}"),
        });
    }
    if topology.is_single_leaf() {
        return Err(WdfError::decomposition(format!(
            "component '{}' is not part of a closed loop",
            graph.edge(topology.root_edge()).id
        )));
    }

    let input_edge = input_edge(graph);
    let root = topology.root();
    let (net_child, leaf_child) = match root.children.as_slice() {
        [leaf, net] => (*net, *leaf),
        _ => {
            return Err(WdfError::decomposition(
                "topology root must join the root component and one network",
            ))
        }
    };

    let mut builder = Builder {
        graph,
        topology,
        t: sampling_period,
        input_edge,
        nodes: Vec::new(),
    };
    let net = builder.build_node(net_child.node)?;

    let root_edge = match topology.node(leaf_child.node).kind {
        NodeKind::Leaf(edge) => edge,
        _ => return Err(WdfError::decomposition("topology root has no root component")),
    };
    let root_leaf = builder.leaf(root_edge);
    if root_leaf.is_nonlinear() {
        tracing::debug!("wdf: nonlinear root '{}' solved exactly", root_leaf.name);
    }
    builder.nodes.push(WdfNode::Leaf(root_leaf));

    let nodes = builder.nodes;
    let find = |edge: Option<EdgeId>| {
        edge.and_then(|e| {
            nodes
                .iter()
                .position(|n| matches!(n, WdfNode::Leaf(l) if l.edge == e))
        })
    };
    let input = find(input_edge);
    let output = find(
        graph
            .edges()
            .iter()
            .position(|e| e.options.output)
            .map(EdgeId),
    );

    let tree = WdfTree::from_parts(
        nodes,
        net,
        net_child.flip,
        input,
        output,
        sampling_period,
        newton,
    );
    tracing::info!(
        nodes = tree.node_count(),
        link_resistance = tree.link_resistance(),
        "wdf tree built"
    );
    Ok(tree)
}

/// The source receiving the audio signal: the first flagged input, else the
/// first AC voltage source.
fn input_edge(graph: &CircuitGraph) -> Option<EdgeId> {
    let edges = graph.edges();
    edges
        .iter()
        .position(|e| e.options.input && e.component.is_source())
        .or_else(|| {
            edges.iter().position(|e| {
                matches!(
                    e.component,
                    Component::VoltageSource(v) if matches!(v.waveform, SourceWaveform::Ac { .. })
                )
            })
        })
        .map(EdgeId)
}

struct Builder<'a> {
    graph: &'a CircuitGraph,
    topology: &'a TopologyTree,
    t: f64,
    input_edge: Option<EdgeId>,
    nodes: Vec<WdfNode>,
}

impl Builder<'_> {
    fn leaf(&self, edge: EdgeId) -> Leaf {
        let e = self.graph.edge(edge);
        Leaf::new(edge, &e.id, &e.component, self.t, self.input_edge == Some(edge))
    }

    /// Build the subtree for a non-root topology node; returns its arena
    /// index. Children are pushed before their parent.
    fn build_node(&mut self, index: usize) -> Result<usize> {
        let node = self.topology.node(index);

        if let NodeKind::Leaf(edge) = node.kind {
            let e = self.graph.edge(edge);
            if let Component::VoltageSource(v) = e.component {
                if v.is_ideal() {
                    return Err(WdfError::UnsupportedComponent {
                        component: e.id.clone(),
                        kind: e.component.kind_name(),
                        message: "an ideal voltage source can only be the root component"
                            .to_string(),
                    });
                }
            }
            let leaf = self.leaf(edge);
            if leaf.is_nonlinear() {
                tracing::warn!(
                    "wdf: nonlinear '{}' is not the root; using a one-sample delayed solve",
                    leaf.name
                );
            }
            self.nodes.push(WdfNode::Leaf(leaf));
            return Ok(self.nodes.len() - 1);
        }

        let mut children = Vec::with_capacity(node.children.len());
        let mut resistances = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let c = self.build_node(child.node)?;
            resistances.push(self.nodes[c].port_resistance());
            children.push(c);
        }
        let flips: Vec<bool> = node.children.iter().map(|c| c.flip).collect();

        let adaptor = match &node.kind {
            NodeKind::Series => Adaptor::Series(SeriesAdaptor::new(&resistances, &flips)),
            NodeKind::Parallel => Adaptor::Parallel(ParallelAdaptor::new(&resistances, &flips)),
            NodeKind::Rigid { ports } => {
                tracing::debug!("wdf: rigid adaptor with {} ports", ports.len());
                Adaptor::Rigid(RigidAdaptor::new(&resistances, ports, node.terminals)?)
            }
            NodeKind::Leaf(_) => {
                return Err(WdfError::decomposition("leaf node with children"));
            }
        };

        self.nodes.push(WdfNode::Adaptor { adaptor, children });
        Ok(self.nodes.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentOptions;
    use crate::components::{Capacitor, Resistor, VoltageSource};
    use crate::topology::decompose;

    fn series_rc(source_options: ComponentOptions, source: VoltageSource) -> WdfTree {
        let mut g = CircuitGraph::new();
        g.create_edge("V1", Component::VoltageSource(source), source_options)
            .unwrap();
        g.create_edge("R1", Component::Resistor(Resistor::new(1e3)), ComponentOptions::default())
            .unwrap();
        g.create_edge(
            "C1",
            Component::Capacitor(Capacitor::new(100e-9)),
            ComponentOptions::output(),
        )
        .unwrap();
        g.connect("in", "0", "V1").unwrap();
        g.connect("in", "out", "R1").unwrap();
        g.connect("out", "0", "C1").unwrap();
        let topo = decompose(&g).unwrap();
        build(&g, &topo, 1.0 / 48000.0, NewtonRaphson::new()).unwrap()
    }

    #[test]
    fn test_series_rc_is_one_series_adaptor() {
        let tree = series_rc(ComponentOptions::input(), VoltageSource::ac(440.0, 1.0));

        let adaptors = tree
            .nodes
            .iter()
            .filter(|n| matches!(n, WdfNode::Adaptor { .. }))
            .count();
        assert_eq!(adaptors, 1);

        let WdfNode::Adaptor { adaptor, children } = &tree.nodes[tree.net] else {
            panic!("network top is not an adaptor");
        };
        assert!(matches!(adaptor, Adaptor::Series(_)));
        let mut names: Vec<&str> = children
            .iter()
            .map(|&c| match &tree.nodes[c] {
                WdfNode::Leaf(leaf) => leaf.name.as_str(),
                WdfNode::Adaptor { .. } => panic!("series child is not a leaf"),
            })
            .collect();
        names.sort();
        assert_eq!(names, ["C1", "R1"]);
        assert_eq!(tree.root_leaf().map(|l| l.name.as_str()), Some("V1"));
        assert!(tree.is_ready());
    }

    #[test]
    fn test_no_input_source_is_not_ready() {
        let tree = series_rc(ComponentOptions::default(), VoltageSource::dc(1.0));
        assert!(!tree.has_input());
        assert!(!tree.is_ready());
    }
}
