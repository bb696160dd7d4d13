use handeye_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Generic non-linear least squares problem with dense parameter/residual vectors.
///
/// The solver minimizes `0.5 * |r(x)|²`. Problems supply unweighted residuals and
/// their Jacobian; the default `residuals`/`jacobian` forward to those.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    /// Unweighted residuals for the current parameters.
    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real>;
    /// Unweighted Jacobian for the current parameters.
    fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real>;

    /// Residuals used by the solver.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        self.residuals_unweighted(x)
    }

    /// Jacobian used by the solver.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        self.jacobian_unweighted(x)
    }

    /// Objective value `0.5 * |r|²`.
    fn cost(&self, x: &DVector<Real>) -> Real {
        0.5 * self.residuals(x).norm_squared()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Maximum number of solver iterations before termination.
    ///
    /// Backends may interpret this as a function-evaluation cap; the MINPACK
    /// backend follows the convention `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Relative tolerance on the objective (cost) reduction.
    pub ftol: Real,
    /// Orthogonality/gradient tolerance.
    pub gtol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
    /// Log every iteration at `debug` level.
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            gtol: 1e-12,
            xtol: 1e-12,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Outer iterations for [`crate::DampedLmBackend`]; residual evaluations
    /// for [`crate::LmBackend`], whose crate reports no iteration count.
    pub iterations: usize,
    pub initial_cost: Real,
    pub final_cost: Real,
    /// A tolerance was met before the iteration budget ran out.
    pub converged: bool,
    /// Cost after every accepted step, starting with the initial cost.
    ///
    /// Backends without per-iteration access record only the initial and final cost.
    pub cost_history: Vec<Real>,
}

pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
