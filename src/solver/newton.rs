//! Newton-Raphson iteration for nonlinear leaves.
//!
//! Every nonlinear element in a WDF tree reduces to one scalar equation in
//! its port voltage, so the iteration here is one-dimensional.

use super::{CONVERGENCE_TOLERANCE, MAX_ITERATIONS};

/// Result of one Newton solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonOutcome {
    /// Final iterate (the last one if the solve did not converge)
    pub x: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether both the step and the residual fell below the tolerance
    pub converged: bool,
    /// Magnitude of the residual at the last evaluation
    pub residual: f64,
}

/// Bounded scalar Newton-Raphson solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Convergence tolerance, applied to both the Newton step and the
    /// residual of the accepted iterate
    pub tolerance: f64,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    /// Create a solver with the default budget.
    pub fn new() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            tolerance: CONVERGENCE_TOLERANCE,
        }
    }

    /// Solve `f(x) = 0` starting from `x0`.
    ///
    /// `f` returns the residual and its derivative. `limit` maps a proposed
    /// iterate to an accepted one given the previous iterate.
    pub fn solve<F, L>(&self, x0: f64, mut f: F, limit: L) -> NewtonOutcome
    where
        F: FnMut(f64) -> (f64, f64),
        L: Fn(f64, f64) -> f64,
    {
        let mut x = x0;
        let mut residual = f64::INFINITY;

        for iter in 0..self.max_iterations {
            let (fx, dfx) = f(x);
            residual = fx.abs();

            if !fx.is_finite() || !dfx.is_finite() || dfx == 0.0 {
                return NewtonOutcome {
                    x,
                    iterations: iter + 1,
                    converged: false,
                    residual,
                };
            }

            let x_new = limit(x, x - fx / dfx);
            let step = (x_new - x).abs();
            x = x_new;

            if step < self.tolerance {
                let (fx, _) = f(x);
                residual = fx.abs();
                if residual < self.tolerance {
                    return NewtonOutcome {
                        x,
                        iterations: iter + 1,
                        converged: true,
                        residual,
                    };
                }
            }
        }

        NewtonOutcome {
            x,
            iterations: self.max_iterations,
            converged: false,
            residual,
        }
    }
}
