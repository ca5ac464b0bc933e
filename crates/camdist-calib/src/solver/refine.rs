use nalgebra::{DMatrix, DVector};

use crate::cancel::CancelToken;
use crate::error::CalibError;

/// A nonlinear least squares problem over a flat parameter vector.
pub(crate) trait NllsProblem {
    /// The length of the residual vector.
    fn num_residuals(&self) -> usize;

    /// Evaluate the residuals at `params` into `out`.
    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);
}

/// Options of the Levenberg-Marquardt refinement.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SolveOptions {
    /// Maximum number of accepted iterations.
    pub max_iters: usize,
    /// Relative cost decrease below which the solve stops.
    pub ftol: f64,
    /// Gradient infinity norm below which the solve stops.
    pub gtol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 50,
            ftol: 1e-10,
            gtol: 1e-10,
        }
    }
}

/// Outcome of the refinement.
#[derive(Clone, Copy, Debug)]
pub struct SolveReport {
    /// Number of accepted iterations.
    pub iterations: usize,
    /// Sum of squared residuals at the initial parameters.
    pub initial_cost: f64,
    /// Sum of squared residuals at the final parameters.
    pub final_cost: f64,
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

/// Minimize the sum of squared residuals with Levenberg-Marquardt.
///
/// Uses a forward difference Jacobian and damped normal equations. Damping
/// grows until a step decreases the cost; the solve fails with
/// [`CalibError::SolverDivergence`] when no such step exists.
pub(crate) fn solve_lm<P: NllsProblem>(
    problem: &P,
    params0: DVector<f64>,
    options: &SolveOptions,
    cancel: &CancelToken,
) -> Result<(DVector<f64>, SolveReport), CalibError> {
    let num_params = params0.len();
    let num_residuals = problem.num_residuals();
    if num_residuals < num_params {
        return Err(CalibError::SolverDivergence(format!(
            "underdetermined system: {num_residuals} residuals for {num_params} parameters"
        )));
    }

    let mut params = params0;
    let mut residuals = DVector::zeros(num_residuals);
    problem.residuals(&params, &mut residuals);
    let mut cost = residuals.norm_squared();
    if !cost.is_finite() {
        return Err(CalibError::SolverDivergence(
            "residuals are not finite at the initial parameters".to_string(),
        ));
    }
    let initial_cost = cost;

    let mut jacobian = DMatrix::zeros(num_residuals, num_params);
    let mut perturbed = DVector::zeros(num_residuals);
    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0;

    for _ in 0..options.max_iters {
        if cancel.is_cancelled() {
            return Err(CalibError::Cancelled);
        }

        numeric_jacobian(problem, &params, &residuals, &mut perturbed, &mut jacobian);

        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * &residuals;

        if jtr.amax() < options.gtol {
            break;
        }

        // Increase damping until a step decreases the cost.
        let mut stepped = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for i in 0..num_params {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }

            let step = match damped.cholesky() {
                Some(chol) => chol.solve(&jtr),
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };

            let candidate = &params - &step;
            problem.residuals(&candidate, &mut perturbed);
            let candidate_cost = perturbed.norm_squared();

            if candidate_cost.is_finite() && candidate_cost < cost {
                let decrease = (cost - candidate_cost) / cost.max(f64::MIN_POSITIVE);
                params = candidate;
                std::mem::swap(&mut residuals, &mut perturbed);
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-15);
                iterations += 1;
                stepped = true;

                if decrease < options.ftol {
                    return Ok((
                        params,
                        SolveReport {
                            iterations,
                            initial_cost,
                            final_cost: cost,
                        },
                    ));
                }
                break;
            }
            lambda *= 10.0;
        }

        if !stepped {
            if iterations == 0 {
                return Err(CalibError::SolverDivergence(
                    "no descent step found from the initial parameters".to_string(),
                ));
            }
            break;
        }
    }

    Ok((
        params,
        SolveReport {
            iterations,
            initial_cost,
            final_cost: cost,
        },
    ))
}

fn numeric_jacobian<P: NllsProblem>(
    problem: &P,
    params: &DVector<f64>,
    residuals: &DVector<f64>,
    scratch: &mut DVector<f64>,
    jacobian: &mut DMatrix<f64>,
) {
    let mut probe = params.clone();
    for j in 0..params.len() {
        let step = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        probe[j] = params[j] + step;
        problem.residuals(&probe, scratch);
        probe[j] = params[j];

        for i in 0..residuals.len() {
            jacobian[(i, j)] = (scratch[i] - residuals[i]) / step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Fit y = a * exp(b * x) to exact samples.
    struct ExpFit {
        xs: Vec<f64>,
        ys: Vec<f64>,
    }

    impl NllsProblem for ExpFit {
        fn num_residuals(&self) -> usize {
            self.xs.len()
        }

        fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
            let (a, b) = (params[0], params[1]);
            for (i, (&x, &y)) in self.xs.iter().zip(self.ys.iter()).enumerate() {
                out[i] = a * (b * x).exp() - y;
            }
        }
    }

    #[test]
    fn fits_exponential_model() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 2.5 * (0.7 * x).exp()).collect();
        let problem = ExpFit { xs, ys };

        let params0 = DVector::from_vec(vec![1.0, 0.1]);
        let (params, report) = solve_lm(
            &problem,
            params0,
            &SolveOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_relative_eq!(params[0], 2.5, epsilon = 1e-6);
        assert_relative_eq!(params[1], 0.7, epsilon = 1e-6);
        assert!(report.final_cost < report.initial_cost);
        assert!(report.final_cost < 1e-12);
    }

    #[test]
    fn underdetermined_problem_is_rejected() {
        let problem = ExpFit {
            xs: vec![1.0],
            ys: vec![2.0],
        };
        let res = solve_lm(
            &problem,
            DVector::from_vec(vec![1.0, 0.1]),
            &SolveOptions::default(),
            &CancelToken::new(),
        );
        assert!(matches!(res, Err(CalibError::SolverDivergence(_))));
    }

    #[test]
    fn cancellation_stops_the_solve() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 2.5 * (0.7 * x).exp()).collect();
        let problem = ExpFit { xs, ys };

        let cancel = CancelToken::new();
        cancel.cancel();
        let res = solve_lm(
            &problem,
            DVector::from_vec(vec![1.0, 0.1]),
            &SolveOptions::default(),
            &cancel,
        );
        assert!(matches!(res, Err(CalibError::Cancelled)));
    }
}
