//! Dense Levenberg-Marquardt with Marquardt diagonal scaling.
//!
//! Each iteration solves `(JᵀJ + λ diag(JᵀJ)) δ = -Jᵀr`. A step is accepted only
//! if it lowers the cost, so the recorded cost history is strictly decreasing.
//! Rejected steps raise `λ`; once `λ` exceeds `max_lambda` no descent direction
//! is left and the current point is reported as converged.

use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use handeye_core::Real;
use log::debug;
use nalgebra::{DMatrix, DVector};

const MIN_DIAG: Real = 1e-12;

#[derive(Debug, Clone)]
pub struct DampedLmBackend {
    pub initial_lambda: Real,
    pub lambda_up: Real,
    pub lambda_down: Real,
    pub max_lambda: Real,
}

impl Default for DampedLmBackend {
    fn default() -> Self {
        Self {
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 10.0,
            max_lambda: 1e16,
        }
    }
}

fn solve_damped(jtj: &DMatrix<Real>, g: &DVector<Real>, lambda: Real) -> Option<DVector<Real>> {
    let mut lhs = jtj.clone();
    for i in 0..lhs.nrows() {
        lhs[(i, i)] += lambda * jtj[(i, i)].max(MIN_DIAG);
    }
    let rhs = -g;
    match lhs.clone().cholesky() {
        Some(chol) => Some(chol.solve(&rhs)),
        None => lhs.lu().solve(&rhs),
    }
}

fn all_finite(v: &DVector<Real>) -> bool {
    v.iter().all(|x| x.is_finite())
}

impl NllsSolverBackend for DampedLmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let mut x = x0;
        let mut r = problem.residuals(&x);
        let mut cost = 0.5 * r.norm_squared();
        let initial_cost = cost;
        let mut history = vec![cost];
        let mut lambda = self.initial_lambda;
        let mut iterations = 0;
        let mut converged = cost == 0.0;

        if !all_finite(&r) {
            return (
                x,
                SolveReport {
                    iterations,
                    initial_cost,
                    final_cost: cost,
                    converged: false,
                    cost_history: history,
                },
            );
        }

        'outer: while !converged && iterations < opts.max_iters {
            iterations += 1;
            let jac = problem.jacobian(&x);
            let jt = jac.transpose();
            let jtj = &jt * &jac;
            let g = &jt * &r;

            if g.amax() <= opts.gtol {
                converged = true;
                break;
            }

            loop {
                let step = solve_damped(&jtj, &g, lambda).filter(all_finite);
                let Some(delta) = step else {
                    lambda *= self.lambda_up;
                    if lambda > self.max_lambda {
                        converged = true;
                        break 'outer;
                    }
                    continue;
                };

                let x_new = &x + &delta;
                let r_new = problem.residuals(&x_new);
                let cost_new = 0.5 * r_new.norm_squared();

                if all_finite(&r_new) && cost_new < cost {
                    let rel_decrease = (cost - cost_new) / cost.max(Real::MIN_POSITIVE);
                    let step_small = delta.norm() <= opts.xtol * (x.norm() + opts.xtol);
                    x = x_new;
                    r = r_new;
                    cost = cost_new;
                    history.push(cost);
                    lambda = (lambda / self.lambda_down).max(1e-12);
                    if opts.verbose {
                        debug!("damped lm iter {iterations}: cost {cost:.6e}, lambda {lambda:.1e}");
                    }
                    if rel_decrease <= opts.ftol || step_small || cost == 0.0 {
                        converged = true;
                    }
                    break;
                }

                lambda *= self.lambda_up;
                if lambda > self.max_lambda {
                    converged = true;
                    break 'outer;
                }
            }
        }

        (
            x,
            SolveReport {
                iterations,
                initial_cost,
                final_cost: cost,
                converged,
                cost_history: history,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rosenbrock;

    impl NllsProblem for Rosenbrock {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            2
        }

        fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_vec(vec![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]])
        }

        fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_row_slice(2, 2, &[-20.0 * x[0], 10.0, -1.0, 0.0])
        }
    }

    #[test]
    fn solves_rosenbrock_with_decreasing_cost() {
        let (x, report) = DampedLmBackend::default().solve(
            &Rosenbrock,
            DVector::from_vec(vec![-1.2, 1.0]),
            &SolveOptions::default(),
        );
        assert!((x[0] - 1.0).abs() < 1e-8, "x = {x}");
        assert!((x[1] - 1.0).abs() < 1e-8, "x = {x}");
        assert!(report.converged);
        assert!(report.final_cost < 1e-16);
        assert_eq!(report.cost_history[0], report.initial_cost);
        assert!(report
            .cost_history
            .windows(2)
            .all(|w| w[1] < w[0]));
    }

    #[test]
    fn reports_non_convergence_when_budget_is_exhausted() {
        let opts = SolveOptions {
            max_iters: 2,
            ..SolveOptions::default()
        };
        let (_, report) =
            DampedLmBackend::default().solve(&Rosenbrock, DVector::from_vec(vec![-1.2, 1.0]), &opts);
        assert_eq!(report.iterations, 2);
        assert!(!report.converged);
        assert!(report.final_cost <= report.initial_cost);
    }

    #[test]
    fn zero_cost_start_is_converged() {
        let (x, report) = DampedLmBackend::default().solve(
            &Rosenbrock,
            DVector::from_vec(vec![1.0, 1.0]),
            &SolveOptions::default(),
        );
        assert_eq!(x[0], 1.0);
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
    }
}
