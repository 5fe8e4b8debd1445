//! Wave digital filter tree.
//!
//! A [`WdfTree`] mirrors a [`TopologyTree`](crate::topology::TopologyTree):
//! series, parallel and rigid nodes become scattering adaptors, components
//! become one-port leaves. Per sample, leaves send reflected waves up,
//! adaptors combine them, the root resolves its law, and adaptors scatter
//! incident waves back down.
//!
//! The root component sits on a link to the top of the network whose
//! resistance is the network's adapted port resistance. This allows an
//! ideal voltage source or a nonlinear element at the root without a
//! delay-free loop. Nonlinear components elsewhere in the tree use their
//! small-signal resistance at 1 mA and solve against the previous sample's
//! incident wave.

mod adaptor;
mod builder;
mod leaf;
mod tree;

pub use adaptor::{Adaptor, ParallelAdaptor, RigidAdaptor, SeriesAdaptor, Wave};
pub use builder::build;
pub use leaf::{Drive, Element, Junction, Leaf};
pub use tree::{WdfNode, WdfTree};
