//! Series/parallel/rigid decomposition of a circuit graph.
//!
//! The decomposition produces a [`TopologyTree`]: an arena of nodes where
//! every leaf is one component and every inner node combines its children in
//! series, in parallel, or through an irreducible ("rigid") connection. The
//! root is always a two-child parallel node joining the root component to
//! the rest of the circuit.

mod decompose;

pub use decompose::decompose;

use std::fmt::Write as _;

use crate::circuit::{CircuitGraph, EdgeId, VertexId};

/// How a node combines its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A single component
    Leaf(EdgeId),
    /// Children share one current
    Series,
    /// Children share one voltage
    Parallel,
    /// Irreducible connection. `ports[i]` is the vertex pair child `i`
    /// is connected to, in the child's own orientation.
    Rigid { ports: Vec<(VertexId, VertexId)> },
}

impl NodeKind {
    /// Short tag used in logs and listings.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Leaf(_) => "leaf",
            NodeKind::Series => "series",
            NodeKind::Parallel => "parallel",
            NodeKind::Rigid { .. } => "rigid",
        }
    }
}

/// Reference from a node to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Child {
    /// Arena index of the child
    pub node: usize,
    /// The child's terminals are reversed relative to the parent's
    /// traversal direction.
    pub flip: bool,
}

/// One node of the decomposition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyNode {
    pub kind: NodeKind,
    /// `(positive, negative)` vertices of this node as a two-terminal element
    pub terminals: (VertexId, VertexId),
    pub children: Vec<Child>,
    /// Every component in this subtree, in leaf order
    pub edges: Vec<EdgeId>,
}

impl TopologyNode {
    /// Whether this node is a single component.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }
}

/// Decomposition of a whole circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyTree {
    /// Arena in pre-order; index 0 is the root
    pub(crate) nodes: Vec<TopologyNode>,
    pub(crate) root_edge: EdgeId,
}

impl TopologyTree {
    /// The root node.
    pub fn root(&self) -> &TopologyNode {
        &self.nodes[0]
    }

    /// Node by arena index.
    pub fn node(&self, index: usize) -> &TopologyNode {
        &self.nodes[index]
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    /// The component chosen as the tree root.
    pub fn root_edge(&self) -> EdgeId {
        self.root_edge
    }

    /// Components of all leaves in pre-order.
    pub fn leaves(&self) -> Vec<EdgeId> {
        self.nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Leaf(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Whether the tree is a lone component with no closed loop.
    pub fn is_single_leaf(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Indented listing with component and vertex names.
    pub fn describe(&self, graph: &CircuitGraph) -> String {
        let mut out = String::new();
        self.describe_node(graph, 0, 0, false, &mut out);
        out
    }

    fn describe_node(
        &self,
        graph: &CircuitGraph,
        index: usize,
        depth: usize,
        flip: bool,
        out: &mut String,
    ) {
        let node = &self.nodes[index];
        let (a, b) = node.terminals;
        let indent = "  ".repeat(depth);
        let mark = if flip { " (reversed)" } else { "" };
        let _ = match &node.kind {
            NodeKind::Leaf(e) => {
                let edge = graph.edge(*e);
                writeln!(
                    out,
                    "{indent}{} [{}] {}-{}{mark}",
                    edge.id,
                    edge.component.kind_name(),
                    graph.vertex_name(a),
                    graph.vertex_name(b)
                )
            }
            kind => writeln!(
                out,
                "{indent}{} {}-{}{mark}",
                kind.tag(),
                graph.vertex_name(a),
                graph.vertex_name(b)
            ),
        };
        for child in &node.children {
            self.describe_node(graph, child.node, depth + 1, child.flip, out);
        }
    }
}
