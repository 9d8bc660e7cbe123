//! Damped linear least-squares step.
//!
//! Each Levenberg–Marquardt iteration solves
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! where `D = diag(‖J_j‖)` (Marquardt scaling). We substitute `δ = D⁻¹ u`,
//! stack the damping rows under the scaled Jacobian and solve the tall system
//!
//! ```text
//! [ J D⁻¹ ]       [ -r ]
//! [ √λ I  ] u  =  [  0 ]
//! ```
//!
//! by SVD. The damping rows keep the system full rank, so a zero Jacobian
//! column (for example the exponent of a power law whose amplitude is still 0)
//! simply yields a zero step for that parameter.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoffs, tried from strict to loose.
const RELATIVE_TOLERANCES: [f64; 3] = [1e-14, 1e-12, 1e-10];

/// Solve a least squares problem by SVD.
///
/// Returns `None` when no tolerance produces a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    if !largest.is_finite() || largest <= 0.0 {
        return None;
    }

    for &rel in &RELATIVE_TOLERANCES {
        if let Ok(beta) = svd.solve(y, rel * largest) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Column norms of `j`, with zero columns reported as `1.0` so they can be
/// used as divisors.
pub fn column_scales(j: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        j.ncols(),
        j.column_iter().map(|c| {
            let n = c.norm();
            if n > 0.0 && n.is_finite() { n } else { 1.0 }
        }),
    )
}

/// Solve for the damped step `δ` given the Jacobian, residuals and `λ`.
pub fn solve_damped_step(
    j: &DMatrix<f64>,
    residuals: &DVector<f64>,
    lambda: f64,
    scales: &DVector<f64>,
) -> Option<DVector<f64>> {
    let (m, n) = j.shape();
    let sqrt_lambda = lambda.sqrt();

    let mut a = DMatrix::<f64>::zeros(m + n, n);
    let mut b = DVector::<f64>::zeros(m + n);
    for col in 0..n {
        let s = scales[col];
        for row in 0..m {
            a[(row, col)] = j[(row, col)] / s;
        }
        a[(m + col, col)] = sqrt_lambda;
    }
    for row in 0..m {
        b[row] = -residuals[row];
    }

    let u = solve_least_squares(&a, &b)?;
    Some(u.component_div(scales))
}
