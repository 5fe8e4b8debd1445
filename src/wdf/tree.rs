//! The per-sample wave scattering engine.

use std::fmt;

use super::adaptor::{Adaptor, Wave};
use super::leaf::Leaf;
use crate::error::{Result, WdfError};
use crate::solver::{NewtonOutcome, NewtonRaphson};

/// A node of the WDF arena.
#[derive(Debug, Clone, PartialEq)]
pub enum WdfNode {
    Adaptor {
        adaptor: Adaptor,
        children: Vec<usize>,
    },
    Leaf(Leaf),
}

impl WdfNode {
    /// Port resistance toward the parent.
    pub fn port_resistance(&self) -> f64 {
        match self {
            WdfNode::Adaptor { adaptor, .. } => adaptor.port_resistance(),
            WdfNode::Leaf(leaf) => leaf.port_resistance(),
        }
    }
}

/// A built wave digital filter.
///
/// The arena holds the network below the root in post-order (children
/// before parents), followed by the root leaf. The root leaf connects
/// directly to the top of the network through a link whose resistance is
/// the network's adapted port resistance.
#[derive(Debug, Clone)]
pub struct WdfTree {
    pub(crate) nodes: Vec<WdfNode>,
    pub(crate) waves: Vec<Wave>,
    /// Arena index of the network top; everything up to it is the network
    pub(crate) net: usize,
    /// Arena index of the root leaf
    pub(crate) root: usize,
    /// Network terminals are reversed relative to the root leaf
    pub(crate) net_flip: bool,
    pub(crate) input: Option<usize>,
    pub(crate) output: Option<usize>,
    pub(crate) sampling_period: f64,
    pub(crate) newton: NewtonRaphson,
    held_output: f32,
}

impl WdfTree {
    pub(crate) fn from_parts(
        nodes: Vec<WdfNode>,
        net: usize,
        net_flip: bool,
        input: Option<usize>,
        output: Option<usize>,
        sampling_period: f64,
        newton: NewtonRaphson,
    ) -> Self {
        let root = nodes.len() - 1;
        let waves = vec![Wave::default(); nodes.len()];
        Self {
            nodes,
            waves,
            net,
            root,
            net_flip,
            input,
            output,
            sampling_period,
            newton,
            held_output: 0.0,
        }
    }

    /// Process one sample.
    ///
    /// On a nonlinear convergence failure the traversal still completes
    /// with the last Newton iterate so that all state stays consistent, and
    /// the failure is reported.
    pub fn process(&mut self, input: f32) -> Result<f32> {
        let fault = self.step(f64::from(input));
        let out = self.output_value() as f32;
        match fault {
            Some(outcome) => Err(WdfError::convergence_failure(
                outcome.iterations,
                outcome.residual,
            )),
            None => {
                self.held_output = out;
                Ok(out)
            }
        }
    }

    /// Process one sample, holding the previous output on a nonlinear
    /// fault. Returns the output and whether the sample was degraded.
    pub fn process_holding(&mut self, input: f32) -> (f32, bool) {
        match self.process(input) {
            Ok(y) => (y, false),
            Err(_) => (self.held_output, true),
        }
    }

    fn step(&mut self, input: f64) -> Option<NewtonOutcome> {
        let Self {
            nodes,
            waves,
            net,
            root,
            net_flip,
            newton,
            input: input_leaf,
            ..
        } = self;
        let (net, root) = (*net, *root);
        let sign = if *net_flip { -1.0 } else { 1.0 };
        let mut fault = None;

        if let Some(i) = *input_leaf {
            if let WdfNode::Leaf(leaf) = &mut nodes[i] {
                leaf.set_input(input);
            }
        }

        // Up: children precede parents in the arena
        for i in 0..=net {
            let up = match &mut nodes[i] {
                WdfNode::Leaf(leaf) => {
                    let (b, failure) = leaf.reflect(newton);
                    fault = fault.or(failure);
                    b
                }
                WdfNode::Adaptor { adaptor, children } => adaptor.reflect(children, waves),
            };
            waves[i].up = up;
        }

        // Root
        let link = nodes[net].port_resistance();
        let a_root = sign * waves[net].up;
        if let WdfNode::Leaf(leaf) = &mut nodes[root] {
            let (b_root, failure) = leaf.resolve_root(a_root, link, newton);
            fault = fault.or(failure);
            waves[root] = Wave {
                up: b_root,
                down: a_root,
            };
            waves[net].down = sign * b_root;
        }

        // Down: parents before children
        for i in (0..=net).rev() {
            match &mut nodes[i] {
                WdfNode::Leaf(leaf) => leaf.incident(waves[i].down),
                WdfNode::Adaptor { adaptor, children } => {
                    let wave = waves[i];
                    adaptor.scatter(children, wave, waves);
                }
            }
        }

        for node in nodes.iter_mut() {
            if let WdfNode::Leaf(leaf) = node {
                leaf.tick();
            }
        }

        fault
    }

    fn output_value(&self) -> f64 {
        match self.output {
            Some(i) => self.waves[i].voltage(),
            None => self.waves[self.root].up,
        }
    }

    /// Return every leaf to its initial state.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            if let WdfNode::Leaf(leaf) = node {
                leaf.reset();
            }
        }
        self.waves.fill(Wave::default());
        self.held_output = 0.0;
    }

    /// Check that the tree can run on audio: an input source receives the
    /// samples, every non-root leaf has a finite positive port resistance
    /// and every adaptor coefficient is finite.
    pub fn is_ready(&self) -> bool {
        self.input.is_some()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                WdfNode::Adaptor { adaptor, .. } => adaptor.is_finite(),
                WdfNode::Leaf(leaf) => {
                    let r = leaf.port_resistance();
                    r.is_finite() && (r > 0.0 || i == self.root)
                }
            })
            && self.nodes[self.net].port_resistance() > 0.0
    }

    /// Whether a source receives the audio input.
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Change frequency and amplitude of the input source (or of the first
    /// AC source when no input is flagged).
    pub fn set_input_waveform(&mut self, frequency: f64, amplitude: f64) {
        let t = self.sampling_period;
        if let Some(i) = self.input {
            if let WdfNode::Leaf(leaf) = &mut self.nodes[i] {
                leaf.set_waveform(frequency, amplitude, t);
            }
        }
    }

    /// Sum of `state² / R` over reactive leaves.
    pub fn stored_energy(&self) -> f64 {
        self.leaves().map(Leaf::stored_energy).sum()
    }

    /// All leaves, root last.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> {
        self.nodes.iter().filter_map(|n| match n {
            WdfNode::Leaf(leaf) => Some(leaf),
            WdfNode::Adaptor { .. } => None,
        })
    }

    /// The root leaf.
    pub fn root_leaf(&self) -> Option<&Leaf> {
        match &self.nodes[self.root] {
            WdfNode::Leaf(leaf) => Some(leaf),
            WdfNode::Adaptor { .. } => None,
        }
    }

    /// Port resistance of the network seen by the root.
    pub fn link_resistance(&self) -> f64 {
        self.nodes[self.net].port_resistance()
    }

    /// Number of arena nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Sampling period the tree was built for.
    pub fn sampling_period(&self) -> f64 {
        self.sampling_period
    }

    /// Whether the output is a flagged component's voltage.
    pub fn has_output_probe(&self) -> bool {
        self.output.is_some()
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, index: usize, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match &self.nodes[index] {
            WdfNode::Leaf(leaf) => writeln!(
                f,
                "{indent}{} R={:.6e}",
                leaf.name,
                leaf.port_resistance()
            ),
            WdfNode::Adaptor { adaptor, children } => {
                writeln!(
                    f,
                    "{indent}{} adaptor R={:.6e}",
                    adaptor.tag(),
                    adaptor.port_resistance()
                )?;
                for &c in children {
                    self.fmt_node(f, c, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for WdfTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = self.root_leaf() {
            let mode = if root.is_nonlinear() {
                "nonlinear root"
            } else {
                "root"
            };
            writeln!(f, "{} ({mode}, link R={:.6e})", root.name, self.link_resistance())?;
        }
        self.fmt_node(f, self.net, 1)
    }
}
