//! Yield / discount-factor conversions and the forward-rate policy.
//!
//! All rates are continuously compounded decimals (`0.025` = 2.5%).
//!
//! Forward rates are the instantaneous forward `f(t) = -d ln P(t) / dt`,
//! discretised on the log-discount `g(t) = t·s(t) = -ln P(t)`:
//!
//! - centred, span `h`, when `t - h >= 0`:  `(g(t+h) - g(t-h)) / 2h`
//! - one-sided at the short end (`t - h < 0`): `(g(t+h) - g(t)) / h`
//!
//! The one-sided branch never looks up a negative maturity, so `f(0, h)` is
//! always defined. The span `h` sets the smoothing of forward curves: a larger
//! `h` averages the forward over a wider window.

use crate::error::CurveError;

/// Discount factor `P = exp(-y t)`.
pub fn discount(y: f64, t: f64) -> f64 {
    (-y * t).exp()
}

/// Continuously compounded yield `-ln(P) / t`.
///
/// Undefined at `t = 0`; callers with a short-rate limit handle that point themselves.
pub fn yield_from_discount(p: f64, t: f64) -> Result<f64, CurveError> {
    if !(t > 0.0) {
        return Err(CurveError::OutOfDomain { t });
    }
    if !(p > 0.0) {
        return Err(CurveError::InvalidParameter {
            name: "discount factor",
            value: p,
        });
    }
    Ok(-p.ln() / t)
}

/// Reject negative (or NaN) query maturities.
pub fn check_maturity(t: f64) -> Result<(), CurveError> {
    if t >= 0.0 && t.is_finite() {
        Ok(())
    } else {
        Err(CurveError::OutOfDomain { t })
    }
}

/// Forward rate over span `h` at `t`, given a spot-rate function.
pub fn forward_from_spot<F>(spot: F, t: f64, h: f64) -> Result<f64, CurveError>
where
    F: Fn(f64) -> Result<f64, CurveError>,
{
    check_maturity(t)?;
    if !(h > 0.0 && h.is_finite()) {
        return Err(CurveError::InvalidParameter {
            name: "forward tenor",
            value: h,
        });
    }

    let g = |x: f64| -> Result<f64, CurveError> { Ok(x * spot(x)?) };

    if t - h >= 0.0 {
        Ok((g(t + h)? - g(t - h)?) / (2.0 * h))
    } else {
        Ok((g(t + h)? - g(t)?) / h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_and_yield_round_trip() {
        let p = discount(0.03, 7.0);
        let y = yield_from_discount(p, 7.0).unwrap();
        assert!((y - 0.03).abs() < 1e-15);
    }

    #[test]
    fn yield_at_zero_maturity_is_domain_error() {
        let err = yield_from_discount(1.0, 0.0).unwrap_err();
        assert_eq!(err, CurveError::OutOfDomain { t: 0.0 });
    }

    #[test]
    fn forward_of_flat_curve_is_flat() {
        let flat = |_t: f64| Ok(0.025);
        for &t in &[0.0, 0.5, 1.0, 30.0] {
            let f = forward_from_spot(flat, t, 1.0).unwrap();
            assert!((f - 0.025).abs() < 1e-14, "t={t} f={f}");
        }
    }

    #[test]
    fn forward_uses_one_sided_difference_at_short_end() {
        // Spot curve that would fail on any negative lookup.
        let spot = |t: f64| {
            check_maturity(t)?;
            Ok(0.01 + 0.001 * t)
        };
        // g(t) = 0.01 t + 0.001 t^2, one-sided at t=0, h=1: (g(1) - g(0)) / 1
        let f = forward_from_spot(spot, 0.0, 1.0).unwrap();
        assert!((f - 0.011).abs() < 1e-15);

        // Centred once t >= h: g'(t) = 0.01 + 0.002 t exactly for a quadratic.
        let f = forward_from_spot(spot, 2.0, 1.0).unwrap();
        assert!((f - 0.014).abs() < 1e-15);
    }

    #[test]
    fn forward_rejects_bad_arguments() {
        let flat = |_t: f64| Ok(0.02);
        assert!(matches!(
            forward_from_spot(flat, -1.0, 1.0),
            Err(CurveError::OutOfDomain { .. })
        ));
        assert!(matches!(
            forward_from_spot(flat, 1.0, 0.0),
            Err(CurveError::InvalidParameter { .. })
        ));
    }
}
