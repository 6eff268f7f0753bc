//! Least squares solver.
//!
//! Both the static Nelson–Siegel profile search and the dynamic model's
//! two-step initialisation regress observed rates on the three loadings for a
//! fixed decay `λ`:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! The design matrix is tall (pillars × 3) and can be nearly collinear for
//! extreme `λ`, so we solve through SVD with a short ladder of tolerances.

use nalgebra::{DMatrix, DVector};

use crate::math::basis::{FACTOR_COUNT, loadings};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Loading (design) matrix for a maturity grid: one row `[1, f1, f2]` per maturity.
pub fn loading_matrix(maturities: &[f64], lambda: f64) -> DMatrix<f64> {
    let mut out = DMatrix::<f64>::zeros(maturities.len(), FACTOR_COUNT);
    for (i, &t) in maturities.iter().enumerate() {
        for (j, v) in loadings(t, lambda).into_iter().enumerate() {
            out[(i, j)] = v;
        }
    }
    out
}

/// Regress one rate vector on the loadings; returns `(betas, sse)`.
pub fn factor_regression(design: &DMatrix<f64>, rates: &[f64]) -> Option<([f64; FACTOR_COUNT], f64)> {
    let y = DVector::from_row_slice(rates);
    let beta = solve_least_squares(design, &y)?;
    let resid = &y - design * &beta;
    let sse = resid.norm_squared();
    if !sse.is_finite() {
        return None;
    }
    Some(([beta[0], beta[1], beta[2]], sse))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn factor_regression_recovers_exact_factors() {
        let maturities = [1.0, 3.0, 5.0, 10.0, 20.0, 30.0];
        let lambda = 1.8;
        let truth = [3.0, -1.5, 0.5];
        let rates: Vec<f64> = maturities
            .iter()
            .map(|&t| crate::math::basis::combine(&truth, &loadings(t, lambda)))
            .collect();

        let design = loading_matrix(&maturities, lambda);
        let (beta, sse) = factor_regression(&design, &rates).unwrap();
        for (a, b) in beta.iter().zip(truth.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!(sse < 1e-20);
    }
}
