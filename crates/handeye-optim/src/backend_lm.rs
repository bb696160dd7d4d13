use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use handeye_core::Real;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = self.problem.residuals(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let j = self.problem.jacobian(&self.params);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

/// MINPACK-style Levenberg-Marquardt from the `levenberg-marquardt` crate.
///
/// The crate does not expose per-iteration costs, so `cost_history` only holds
/// the initial and final values, and `iterations` counts residual evaluations.
#[derive(Debug, Default, Clone)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let initial_cost = problem.cost(&x0);
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
        };

        let (wrapper, report) = lm.minimize(wrapper);
        let x_opt = wrapper.params();
        if opts.verbose {
            debug!(
                "minpack lm: {:?} after {} evaluations",
                report.termination, report.number_of_evaluations
            );
        }

        (
            x_opt,
            SolveReport {
                iterations: report.number_of_evaluations,
                initial_cost,
                final_cost: report.objective_function,
                converged: report.termination.was_successful(),
                cost_history: vec![initial_cost, report.objective_function],
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use std::cell::Cell;

    /// Fit `y = a * exp(b * t)` to noiseless samples.
    struct ExpFit {
        t: Vec<Real>,
        y: Vec<Real>,
    }

    impl ExpFit {
        fn new(a: Real, b: Real) -> Self {
            let t: Vec<Real> = (0..12).map(|i| i as Real * 0.25).collect();
            let y = t.iter().map(|t| a * (b * t).exp()).collect();
            Self { t, y }
        }
    }

    impl NllsProblem for ExpFit {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            self.t.len()
        }

        fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_iterator(
                self.t.len(),
                self.t.iter().zip(&self.y).map(|(t, y)| x[0] * (x[1] * t).exp() - y),
            )
        }

        fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_fn(self.t.len(), 2, |i, j| {
                let e = (x[1] * self.t[i]).exp();
                if j == 0 {
                    e
                } else {
                    x[0] * self.t[i] * e
                }
            })
        }
    }

    #[test]
    fn fits_exponential_model() {
        let problem = ExpFit::new(2.0, -0.7);
        let (x, report) = LmBackend.solve(&problem, dvector![1.0, 0.0], &SolveOptions::default());

        assert!((x[0] - 2.0).abs() < 1e-8, "a = {}", x[0]);
        assert!((x[1] + 0.7).abs() < 1e-8, "b = {}", x[1]);
        assert!(report.converged, "{report:?}");
        assert!(report.final_cost < 1e-16);
        assert_eq!(report.cost_history.len(), 2);
        assert_eq!(report.cost_history[0], report.initial_cost);
    }

    struct Counted<'a> {
        inner: &'a ExpFit,
        residual_calls: Cell<usize>,
    }

    impl NllsProblem for Counted<'_> {
        fn num_params(&self) -> usize {
            self.inner.num_params()
        }

        fn num_residuals(&self) -> usize {
            self.inner.num_residuals()
        }

        fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
            self.residual_calls.set(self.residual_calls.get() + 1);
            self.inner.residuals_unweighted(x)
        }

        fn jacobian_unweighted(&self, x: &DVector<Real>) -> DMatrix<Real> {
            self.inner.jacobian_unweighted(x)
        }
    }

    #[test]
    fn iterations_count_residual_evaluations() {
        let fit = ExpFit::new(2.0, -0.7);
        let problem = Counted {
            inner: &fit,
            residual_calls: Cell::new(0),
        };
        let (_, report) = LmBackend.solve(&problem, dvector![1.0, 0.0], &SolveOptions::default());
        let calls = problem.residual_calls.get();
        assert!(report.iterations >= 1);
        assert!(report.iterations <= calls, "{} vs {calls}", report.iterations);
    }

    #[test]
    fn non_finite_start_is_not_converged() {
        let problem = ExpFit::new(2.0, -0.7);
        let (_, report) = LmBackend.solve(
            &problem,
            dvector![1.0, 1e6],
            &SolveOptions::default(),
        );
        assert!(!report.converged);
    }
}
