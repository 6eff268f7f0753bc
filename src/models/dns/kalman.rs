//! Kalman filter and Gaussian log-likelihood for the dynamic model.
//!
//! The filter starts from the stationary factor distribution `N(θ, P∞)` and
//! evaluates the likelihood by prediction-error decomposition. Innovation
//! covariances are factorised with Cholesky; no explicit inverses.

use std::f64::consts::PI;

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::CurveError;
use crate::models::dns::params::DnsParams;

/// Filtered end state and the total log-likelihood.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub log_likelihood: f64,
    /// `E[x_T | y_1..y_T]`.
    pub last_state: DVector<f64>,
    /// `Var[x_T | y_1..y_T]`.
    pub last_covariance: DMatrix<f64>,
}

/// Run the filter over `data` (rows = observation dates).
pub fn filter(params: &DnsParams, data: &DMatrix<f64>) -> Result<FilterOutput, CurveError> {
    let n = data.ncols();
    let b = params.loadings();
    let bt = b.transpose();
    let a = params.transition(params.dt);
    let q = params.process_covariance(params.dt);
    let r = params.observation_covariance();
    let theta = params.theta_vector();
    let ln_2pi = (2.0 * PI).ln();

    let mut x = theta.clone();
    let mut p = params.stationary_covariance();
    let mut ll = 0.0;

    for t in 0..data.nrows() {
        let x_pred = &theta + &a * (&x - &theta);
        let p_pred = &a * &p * a.transpose() + &q;

        let y = DVector::from_iterator(n, data.row(t).iter().copied());
        let v = y - &b * &x_pred;
        let s = &b * &p_pred * &bt + &r;

        let chol = Cholesky::new(s).ok_or_else(|| {
            CurveError::Numerical(format!("innovation covariance not positive definite at row {t}"))
        })?;
        let l = chol.l();
        let log_det: f64 = 2.0 * (0..n).map(|i| l[(i, i)].ln()).sum::<f64>();
        let s_inv_v = chol.solve(&v);
        ll -= 0.5 * (n as f64 * ln_2pi + log_det + v.dot(&s_inv_v));

        // K = P B' S^{-1} = (S^{-1} B P)'
        let gain = chol.solve(&(&b * &p_pred)).transpose();
        x = x_pred + &gain * v;
        let updated = &p_pred - &gain * &b * &p_pred;
        p = (&updated + updated.transpose()) * 0.5;
    }

    if !ll.is_finite() {
        return Err(CurveError::Numerical("non-finite log-likelihood".to_string()));
    }

    Ok(FilterOutput {
        log_likelihood: ll,
        last_state: x,
        last_covariance: p,
    })
}

/// Log-likelihood, with numerical failures mapped to `-∞` for the optimiser.
pub fn log_likelihood(params: &DnsParams, data: &DMatrix<f64>) -> f64 {
    filter(params, data).map_or(f64::NEG_INFINITY, |out| out.log_likelihood)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::basis::{combine, loadings};

    fn params() -> DnsParams {
        DnsParams {
            dt: 1.0 / 250.0,
            maturities: vec![1.0, 3.0, 5.0, 10.0, 20.0, 30.0],
            lambda: 1.8,
            theta: [3.0, -1.5, 0.5],
            kappa: [0.1, 0.2, 0.5],
            sigma: [0.2, 0.0, 0.1, 0.0, 0.0, 0.1],
            obs_std: vec![0.01; 6],
        }
    }

    fn constant_panel(factors: [f64; 3], rows: usize) -> DMatrix<f64> {
        let p = params();
        let row: Vec<f64> = p
            .maturities
            .iter()
            .map(|&t| combine(&factors, &loadings(t, p.lambda)))
            .collect();
        DMatrix::from_fn(rows, row.len(), |_, j| row[j])
    }

    #[test]
    fn filter_tracks_observed_factors() {
        let truth = [2.5, -1.0, 0.8];
        let data = constant_panel(truth, 60);
        let out = filter(&params(), &data).unwrap();
        for i in 0..3 {
            assert!(
                (out.last_state[i] - truth[i]).abs() < 0.02,
                "factor {i}: {} vs {}",
                out.last_state[i],
                truth[i]
            );
        }
        assert!(out.log_likelihood.is_finite());
    }

    #[test]
    fn likelihood_prefers_true_noise_level() {
        let data = constant_panel([3.0, -1.5, 0.5], 40);
        let good = params();
        let mut bad = params();
        bad.theta = [6.0, 1.0, -2.0];
        bad.kappa = [20.0, 20.0, 20.0];
        assert!(log_likelihood(&good, &data) > log_likelihood(&bad, &data));
    }

    #[test]
    fn covariance_stays_symmetric() {
        let data = constant_panel([3.0, -1.5, 0.5], 20);
        let out = filter(&params(), &data).unwrap();
        let p = &out.last_covariance;
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(p[(i, j)], p[(j, i)]);
            }
        }
    }
}
