//! Smith–Wilson term-structure fitting and extrapolation.
//!
//! With UFR intensity `ω` (continuous compounding, `ω = ltfr`) and convergence
//! speed `α`, the discount function is
//!
//! ```text
//! P(t) = e^{-ωt} + Σ_j ζ_j W(t, u_j)
//! W(t, u) = e^{-ω(t+u)} · (α·min(t,u) - ½ e^{-α·max(t,u)} (e^{α·min(t,u)} - e^{-α·min(t,u)}))
//! ```
//!
//! Calibration solves the `n × n` system `W ζ = P_obs - μ` with
//! `μ_i = e^{-ω u_i}`, so the curve reprices every pillar exactly and its
//! forward rate converges to `ω` beyond the last pillar.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{MaturityGrid, check_pillars};
use crate::error::CurveError;
use crate::math::{check_maturity, discount, yield_from_discount};
use crate::models::YieldCurve;

const MODEL: &str = "Smith-Wilson";

/// Serialisable snapshot of a calibrated Smith–Wilson curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmithWilsonParams {
    pub alpha: f64,
    pub ltfr: f64,
    pub maturities: Vec<f64>,
    /// Calibration vector `ζ` (one entry per pillar).
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Calibration {
    maturities: MaturityGrid,
    zeta: DVector<f64>,
}

/// Smith–Wilson curve. Construct once, then [`fit`](Self::fit) (and refit) in place.
#[derive(Debug, Clone)]
pub struct SmithWilsonCurve {
    alpha: f64,
    ltfr: f64,
    calibration: Option<Calibration>,
}

impl SmithWilsonCurve {
    pub fn new(alpha: f64, ltfr: f64) -> Result<Self, CurveError> {
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(CurveError::InvalidParameter {
                name: "alpha",
                value: alpha,
            });
        }
        if !(ltfr > 0.0 && ltfr.is_finite()) {
            return Err(CurveError::InvalidParameter {
                name: "ltfr",
                value: ltfr,
            });
        }
        Ok(Self {
            alpha,
            ltfr,
            calibration: None,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ltfr(&self) -> f64 {
        self.ltfr
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn maturities(&self) -> Option<&[f64]> {
        self.calibration.as_ref().map(|c| c.maturities.as_slice())
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.calibration.as_ref().map(|c| c.zeta.as_slice())
    }

    pub fn params(&self) -> Option<SmithWilsonParams> {
        self.calibration.as_ref().map(|c| SmithWilsonParams {
            alpha: self.alpha,
            ltfr: self.ltfr,
            maturities: c.maturities.as_slice().to_vec(),
            coefficients: c.zeta.iter().copied().collect(),
        })
    }

    /// Fit to observed pillar rates, replacing any previous calibration.
    ///
    /// On failure the curve is left uncalibrated.
    pub fn fit(&mut self, maturities: &[f64], rates: &[f64]) -> Result<(), CurveError> {
        self.calibration = None;

        if MaturityGrid::has_duplicates(maturities) {
            return Err(CurveError::SingularFit {
                maturities: maturities.to_vec(),
            });
        }
        let grid = check_pillars(maturities, rates)?;
        let u = grid.as_slice();
        let n = u.len();

        let kernel = DMatrix::from_fn(n, n, |i, j| self.wilson(u[i], u[j]));
        let rhs = DVector::from_fn(n, |i, _| discount(rates[i], u[i]) - discount(self.ltfr, u[i]));

        let zeta = kernel.lu().solve(&rhs).ok_or_else(|| CurveError::SingularFit {
            maturities: u.to_vec(),
        })?;
        if zeta.iter().any(|v| !v.is_finite()) {
            return Err(CurveError::SingularFit {
                maturities: u.to_vec(),
            });
        }

        self.calibration = Some(Calibration {
            maturities: grid,
            zeta,
        });
        Ok(())
    }

    /// Wilson kernel `W(t, u)`.
    fn wilson(&self, t: f64, u: f64) -> f64 {
        let a = self.alpha;
        let lo = t.min(u);
        let hi = t.max(u);
        (-self.ltfr * (t + u)).exp() * (a * lo - 0.5 * (-a * hi).exp() * 2.0 * (a * lo).sinh())
    }

    fn calibration(&self) -> Result<&Calibration, CurveError> {
        self.calibration
            .as_ref()
            .ok_or(CurveError::NotCalibrated { model: MODEL })
    }

    /// Short-rate limit `-P'(0)`.
    fn short_rate(&self, cal: &Calibration) -> f64 {
        let a = self.alpha;
        let drift: f64 = cal
            .maturities
            .as_slice()
            .iter()
            .zip(cal.zeta.iter())
            .map(|(&u, &z)| z * (-self.ltfr * u).exp() * (1.0 - (-a * u).exp()))
            .sum();
        self.ltfr - a * drift
    }

    fn discount_at(&self, cal: &Calibration, t: f64) -> f64 {
        let basis: f64 = cal
            .maturities
            .as_slice()
            .iter()
            .zip(cal.zeta.iter())
            .map(|(&u, &z)| z * self.wilson(t, u))
            .sum();
        discount(self.ltfr, t) + basis
    }
}

impl YieldCurve for SmithWilsonCurve {
    fn spot_rate(&self, t: f64) -> Result<f64, CurveError> {
        check_maturity(t)?;
        let cal = self.calibration()?;
        if t == 0.0 {
            return Ok(self.short_rate(cal));
        }
        yield_from_discount(self.discount_at(cal, t), t)
    }

    fn discount_factor(&self, t: f64) -> Result<f64, CurveError> {
        check_maturity(t)?;
        Ok(self.discount_at(self.calibration()?, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const MATURITIES: [f64; 6] = [1.0, 3.0, 5.0, 10.0, 20.0, 30.0];
    const RATES: [f64; 6] = [0.016, 0.018, 0.020, 0.024, 0.027, 0.028];

    fn fitted() -> SmithWilsonCurve {
        let mut sw = SmithWilsonCurve::new(0.1, 0.042).unwrap();
        sw.fit(&MATURITIES, &RATES).unwrap();
        sw
    }

    #[test]
    fn reprices_input_pillars() {
        let sw = fitted();
        let spots = sw.spot_rates(&MATURITIES).unwrap();
        for (s, r) in spots.iter().zip(RATES.iter()) {
            assert_abs_diff_eq!(*s, *r, epsilon = 1e-6);
        }
    }

    #[test]
    fn forward_converges_to_ltfr() {
        let sw = fitted();
        let f = sw.forward_rate(100.0, 1.0).unwrap();
        assert_abs_diff_eq!(f, 0.042, epsilon = 1e-3);
        let f = sw.forward_rate(200.0, 1.0).unwrap();
        assert_abs_diff_eq!(f, 0.042, epsilon = 1e-6);
    }

    #[test]
    fn spot_converges_to_ltfr_from_below() {
        let sw = fitted();
        let s100 = sw.spot_rate(100.0).unwrap();
        let s1000 = sw.spot_rate(1000.0).unwrap();
        assert!(s100 < s1000 && s1000 < 0.042);
        assert_abs_diff_eq!(s1000, 0.042, epsilon = 1e-3);
    }

    #[test]
    fn short_rate_matches_limit() {
        let sw = fitted();
        let r0 = sw.spot_rate(0.0).unwrap();
        let near = sw.spot_rate(1e-6).unwrap();
        assert_abs_diff_eq!(r0, near, epsilon = 1e-8);
    }

    #[test]
    fn forward_at_zero_uses_one_sided_difference() {
        let sw = fitted();
        let f = sw.forward_rate(0.0, 1.0).unwrap();
        let g1 = sw.spot_rate(1.0).unwrap();
        assert_abs_diff_eq!(f, g1, epsilon = 1e-12);
    }

    #[test]
    fn refit_overwrites_previous_calibration() {
        let mut reused = fitted();
        let other_mats = [2.0, 7.0, 15.0];
        let other_rates = [0.030, 0.033, 0.035];
        reused.fit(&other_mats, &other_rates).unwrap();

        let mut fresh = SmithWilsonCurve::new(0.1, 0.042).unwrap();
        fresh.fit(&other_mats, &other_rates).unwrap();

        assert_eq!(reused.params(), fresh.params());
        for &t in &[0.0, 1.0, 5.0, 30.0, 80.0] {
            assert_eq!(
                reused.spot_rate(t).unwrap().to_bits(),
                fresh.spot_rate(t).unwrap().to_bits()
            );
        }
    }

    #[test]
    fn failed_refit_clears_calibration() {
        let mut sw = fitted();
        let err = sw.fit(&[1.0, 5.0], &[0.01]).unwrap_err();
        assert!(matches!(err, CurveError::InputShape { .. }));
        assert!(!sw.is_calibrated());
        assert!(matches!(
            sw.spot_rate(1.0),
            Err(CurveError::NotCalibrated { .. })
        ));
    }

    #[test]
    fn duplicate_maturities_are_singular() {
        let mut sw = SmithWilsonCurve::new(0.1, 0.042).unwrap();
        let err = sw
            .fit(&[1.0, 3.0, 3.0, 10.0], &[0.01, 0.02, 0.02, 0.03])
            .unwrap_err();
        assert!(matches!(err, CurveError::SingularFit { .. }));
    }

    #[test]
    fn unsorted_maturities_are_shape_errors() {
        let mut sw = SmithWilsonCurve::new(0.1, 0.042).unwrap();
        let err = sw.fit(&[5.0, 1.0], &[0.01, 0.02]).unwrap_err();
        assert!(matches!(err, CurveError::InputShape { .. }));
    }

    #[test]
    fn negative_maturity_is_rejected() {
        let sw = fitted();
        assert!(matches!(
            sw.spot_rate(-0.5),
            Err(CurveError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn constructor_rejects_non_positive_parameters() {
        assert!(SmithWilsonCurve::new(0.0, 0.042).is_err());
        assert!(SmithWilsonCurve::new(0.1, -0.01).is_err());
    }
}
