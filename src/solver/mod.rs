//! Numerical building blocks for the wave digital filter.
//!
//! - [`NewtonRaphson`]: bounded scalar iteration used by nonlinear leaves
//!   every sample.
//! - [`NodalMatrix`]: dense LU solve used once at build time to compute the
//!   scattering matrix of a rigid (R-type) adaptor from
//!
//! ```text
//! S = 2 Aᵀ (A G Aᵀ)⁻¹ A G − I
//! ```
//!
//! where `A` is the reduced incidence matrix of the rigid group and `G` the
//! diagonal matrix of port conductances.

mod mna;
mod newton;

pub use mna::NodalMatrix;
pub use newton::{NewtonOutcome, NewtonRaphson};

/// Convergence tolerance for Newton-Raphson iteration.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Maximum Newton-Raphson iterations per sample.
pub const MAX_ITERATIONS: usize = 50;
