//! Nelson–Siegel factor loadings.
//!
//! With decay scale `λ > 0` and `x = t/λ`:
//!
//! - level:     `1`
//! - slope:     `(1 - e^{-x}) / x`
//! - curvature: `(1 - e^{-x}) / x - e^{-x}`
//!
//! Numerical notes:
//! - `1 - e^{-x}` cancels catastrophically for small `x`; we use `expm1` and a
//!   series fallback below `SMALL_X`.
//! - At `t = 0` the loadings take their limits `(1, 1, 0)`, which gives the
//!   short-rate identity `y(0) = β0 + β1`.

/// Threshold below which we switch to a small-x series approximation.
const SMALL_X: f64 = 1e-6;

/// Number of Nelson–Siegel factors (level, slope, curvature).
pub const FACTOR_COUNT: usize = 3;

/// Slope loading `(1 - e^{-t/λ}) / (t/λ)`.
pub fn slope_loading(t: f64, lambda: f64) -> f64 {
    let x = t.max(0.0) / lambda;
    if x < SMALL_X {
        // (1 - e^{-x}) / x ≈ 1 - x/2 + x^2/6
        return 1.0 - x / 2.0 + (x * x) / 6.0;
    }
    -(-x).exp_m1() / x
}

/// Curvature loading `(1 - e^{-t/λ}) / (t/λ) - e^{-t/λ}`.
pub fn curvature_loading(t: f64, lambda: f64) -> f64 {
    let x = t.max(0.0) / lambda;
    if x < SMALL_X {
        // f1 ≈ 1 - x/2 + x^2/6, e^{-x} ≈ 1 - x + x^2/2
        return x / 2.0 - (x * x) / 3.0;
    }
    slope_loading(t, lambda) - (-x).exp()
}

/// All three loadings `[level, slope, curvature]` at maturity `t`.
pub fn loadings(t: f64, lambda: f64) -> [f64; FACTOR_COUNT] {
    [1.0, slope_loading(t, lambda), curvature_loading(t, lambda)]
}

/// Loadings of the instantaneous forward curve: `[1, e^{-x}, x e^{-x}]`.
pub fn forward_loadings(t: f64, lambda: f64) -> [f64; FACTOR_COUNT] {
    let x = t.max(0.0) / lambda;
    let e = (-x).exp();
    [1.0, e, x * e]
}

/// Evaluate `β · loadings(t, λ)`.
pub fn combine(betas: &[f64; FACTOR_COUNT], weights: &[f64; FACTOR_COUNT]) -> f64 {
    betas.iter().zip(weights.iter()).map(|(b, w)| b * w).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loadings_limits_at_zero() {
        let l = loadings(0.0, 2.0);
        assert_eq!(l[0], 1.0);
        assert!((l[1] - 1.0).abs() < 1e-12, "slope at 0 should be 1, got {}", l[1]);
        assert!(l[2].abs() < 1e-12, "curvature at 0 should be 0, got {}", l[2]);
    }

    #[test]
    fn series_branch_is_continuous() {
        let lambda = 1.5;
        let t = SMALL_X * lambda;
        let below = slope_loading(t * 0.999, lambda);
        let above = slope_loading(t * 1.001, lambda);
        assert!((below - above).abs() < 1e-9);
        let below = curvature_loading(t * 0.999, lambda);
        let above = curvature_loading(t * 1.001, lambda);
        assert!((below - above).abs() < 1e-9);
    }

    #[test]
    fn long_end_loadings_decay() {
        let l = loadings(1.0e4, 2.0);
        assert!(l[1] < 1e-3);
        assert!(l[2] < 1e-3);
        let f = forward_loadings(1.0e4, 2.0);
        assert!(f[1] < 1e-12 && f[2] < 1e-12);
    }
}
