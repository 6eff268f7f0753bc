//! Curve models.
//!
//! Static curves (`SmithWilsonCurve`, `NelsonSiegelCurve`) share the
//! [`YieldCurve`] evaluation interface; the dynamic model produces scenario
//! rate vectors that are turned back into static curves downstream.

pub mod dns;
pub mod nelson_siegel;
pub mod smith_wilson;

pub use dns::*;
pub use nelson_siegel::*;
pub use smith_wilson::*;

use crate::error::CurveError;
use crate::math::{discount, forward_from_spot};

/// Evaluation interface of a fitted term structure.
///
/// Evaluation never mutates the fit. Negative maturities are rejected with
/// [`CurveError::OutOfDomain`]; an uncalibrated curve reports
/// [`CurveError::NotCalibrated`].
pub trait YieldCurve {
    /// Continuously compounded spot rate at maturity `t >= 0`.
    ///
    /// At `t = 0` this is the short-rate limit.
    fn spot_rate(&self, t: f64) -> Result<f64, CurveError>;

    fn discount_factor(&self, t: f64) -> Result<f64, CurveError> {
        Ok(discount(self.spot_rate(t)?, t))
    }

    /// Forward rate at `t` over span `h` (see [`crate::math::rates`] for the policy).
    fn forward_rate(&self, t: f64, h: f64) -> Result<f64, CurveError> {
        forward_from_spot(|x| self.spot_rate(x), t, h)
    }

    fn spot_rates(&self, ts: &[f64]) -> Result<Vec<f64>, CurveError> {
        ts.iter().map(|&t| self.spot_rate(t)).collect()
    }

    fn forward_rates(&self, ts: &[f64], h: f64) -> Result<Vec<f64>, CurveError> {
        ts.iter().map(|&t| self.forward_rate(t, h)).collect()
    }
}
