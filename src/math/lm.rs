//! Levenberg–Marquardt minimisation of a residual vector.
//!
//! The caller supplies a closure that fills residuals for a parameter vector
//! (already divided by the uncertainties for weighted fits). Each iteration:
//!
//! - builds a forward-difference Jacobian
//! - solves the damped, column-scaled step (`ols::solve_damped_step`)
//! - accepts the step if χ² decreases (λ shrinks), otherwise grows λ and retries
//!
//! Convergence is declared on a small relative χ² reduction, a small step in
//! column-scaled units (`‖D δ‖ ≤ xtol ‖D p‖`), or when λ grows past
//! `max_lambda` (no descent direction left). Neither tolerance stops an
//! iteration whose Jacobian has a zero column.
//! Hitting `max_iterations` is reported through `converged = false`, not as an
//! error.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::ols::{column_scales, solve_damped_step};

#[derive(Debug, Clone)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Relative χ² reduction below which the fit is converged.
    pub ftol: f64,
    /// Relative parameter step below which the fit is converged.
    pub xtol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmResult {
    pub params: Vec<f64>,
    pub chi_square: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("no free parameters to fit")]
    NoFreeParameters,
    #[error("{points} residuals cannot constrain {params} parameters")]
    TooFewPoints { points: usize, params: usize },
    #[error("residuals are not finite at the initial guess")]
    NonFiniteStart,
    #[error("jacobian is not finite at iteration {0}")]
    NonFiniteJacobian(usize),
    #[error("solution parameters are not finite")]
    NonFiniteSolution,
}

/// Minimise `Σ r_i(p)²` starting from `initial`.
///
/// `residuals(p, out)` must fill all `m` entries of `out`.
pub fn levenberg_marquardt<F>(
    residuals: F,
    initial: &[f64],
    m: usize,
    config: &LmConfig,
) -> Result<LmResult, SolveError>
where
    F: Fn(&[f64], &mut [f64]),
{
    let n = initial.len();
    if n == 0 {
        return Err(SolveError::NoFreeParameters);
    }
    if m < n {
        return Err(SolveError::TooFewPoints { points: m, params: n });
    }

    let eval = |p: &[f64], out: &mut DVector<f64>| -> f64 {
        residuals(p, out.as_mut_slice());
        out.norm_squared()
    };

    let mut params = initial.to_vec();
    let mut r = DVector::<f64>::zeros(m);
    let mut chi2 = eval(params.as_slice(), &mut r);
    if !chi2.is_finite() {
        return Err(SolveError::NonFiniteStart);
    }

    let mut lambda = config.initial_lambda;
    let mut trial = vec![0.0; n];
    let mut r_trial = DVector::<f64>::zeros(m);

    for iter in 1..=config.max_iterations {
        if chi2 == 0.0 {
            return Ok(LmResult { params, chi_square: chi2, iterations: iter - 1, converged: true });
        }

        let jac = forward_jacobian(&eval, &params, &r, m).ok_or(SolveError::NonFiniteJacobian(iter))?;
        let scales = column_scales(&jac);
        // A parameter with a zero column cannot move this iteration, so a small
        // step says nothing about convergence.
        let stalled = jac.column_iter().any(|c| c.norm() == 0.0);

        loop {
            let step = solve_damped_step(&jac, &r, lambda, &scales);
            if let Some(step) = step {
                for k in 0..n {
                    trial[k] = params[k] + step[k];
                }
                let chi2_trial = eval(trial.as_slice(), &mut r_trial);

                if chi2_trial.is_finite() && chi2_trial < chi2 {
                    let reduction = (chi2 - chi2_trial) / chi2;
                    let scaled_step = step.component_mul(&scales).norm();
                    let scaled_params = DVector::from_column_slice(&trial).component_mul(&scales).norm();
                    let small_step = scaled_step <= config.xtol * scaled_params;

                    params.copy_from_slice(&trial);
                    std::mem::swap(&mut r, &mut r_trial);
                    chi2 = chi2_trial;
                    lambda = (lambda * config.lambda_down).max(1e-12);

                    log::trace!("lm iter {iter}: chi2={chi2:.6e} lambda={lambda:.1e}");

                    if !stalled && (reduction < config.ftol || small_step) {
                        return finish(params, chi2, iter, true);
                    }
                    break;
                }
            }

            lambda *= config.lambda_up;
            if lambda > config.max_lambda {
                return finish(params, chi2, iter, true);
            }
        }
    }

    log::debug!(
        "lm stopped after {} iterations without meeting tolerances (chi2={chi2:.6e})",
        config.max_iterations
    );
    finish(params, chi2, config.max_iterations, false)
}

fn finish(params: Vec<f64>, chi2: f64, iterations: usize, converged: bool) -> Result<LmResult, SolveError> {
    if params.iter().all(|v| v.is_finite()) && chi2.is_finite() {
        Ok(LmResult { params, chi_square: chi2, iterations, converged })
    } else {
        Err(SolveError::NonFiniteSolution)
    }
}

fn forward_jacobian<E>(eval: &E, params: &[f64], r0: &DVector<f64>, m: usize) -> Option<DMatrix<f64>>
where
    E: Fn(&[f64], &mut DVector<f64>) -> f64,
{
    let n = params.len();
    let sqrt_eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut shifted = params.to_vec();
    let mut r = DVector::<f64>::zeros(m);

    for k in 0..n {
        let h = if params[k] != 0.0 { sqrt_eps * params[k].abs() } else { sqrt_eps };
        shifted[k] = params[k] + h;
        eval(shifted.as_slice(), &mut r);
        shifted[k] = params[k];
        for i in 0..m {
            let d = (r[i] - r0[i]) / h;
            if !d.is_finite() {
                return None;
            }
            jac[(i, k)] = d;
        }
    }

    Some(jac)
}
