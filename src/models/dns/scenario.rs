//! Scenario generation and shock decomposition for a trained model.

use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::CurveError;
use crate::math::basis::FACTOR_COUNT;
use crate::math::rng::GaussianStream;
use crate::models::dns::params::DnsParams;

/// Per-maturity rate changes attributed to named factor moves over a horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockSet {
    pub horizon: f64,
    pub confidence: f64,
    /// Expected drift of rates: `B (E[x_{T+h}] - x_T)`.
    pub mean_reversion: Vec<f64>,
    pub level_up: Vec<f64>,
    pub level_down: Vec<f64>,
    /// Long end rises relative to the short end.
    pub twist_steepen: Vec<f64>,
    pub twist_flatten: Vec<f64>,
}

/// Cholesky factor of a covariance, retrying with diagonal jitter.
pub(crate) fn covariance_factor(cov: &DMatrix<f64>) -> Result<DMatrix<f64>, CurveError> {
    let scale = cov.diagonal().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-300);
    for jitter in [0.0, 1e-12, 1e-10, 1e-8] {
        let mut m = cov.clone();
        for i in 0..m.nrows() {
            m[(i, i)] += jitter * scale;
        }
        if let Some(chol) = Cholesky::new(m) {
            return Ok(chol.l());
        }
    }
    Err(CurveError::Numerical("covariance is not positive semi-definite".to_string()))
}

/// Draw `num` terminal rate vectors after `steps` transitions of `params.dt`.
///
/// Paths are drawn one after the other from a single seeded stream, three
/// normals per step, so the output depends only on the inputs and `seed`.
pub(crate) fn simulate(
    params: &DnsParams,
    start: &DVector<f64>,
    steps: usize,
    num: usize,
    seed: u32,
) -> Result<DMatrix<f64>, CurveError> {
    let a = params.transition(params.dt);
    let chol = covariance_factor(&params.process_covariance(params.dt))?;
    let b = params.loadings();
    let theta = params.theta_vector();

    let mut rng = GaussianStream::new(seed);
    let mut z = DVector::<f64>::zeros(FACTOR_COUNT);
    let mut out = DMatrix::<f64>::zeros(num, b.nrows());

    for path in 0..num {
        let mut x = start.clone();
        for _ in 0..steps {
            rng.fill_normal(z.as_mut_slice());
            x = &theta + &a * (&x - &theta) + &chol * &z;
        }
        let rates = &b * &x;
        out.row_mut(path).tr_copy_from(&rates);
    }

    Ok(out)
}

/// Mean-reversion, level and twist shocks over `horizon`.
pub(crate) fn decompose(
    params: &DnsParams,
    state: &DVector<f64>,
    horizon: f64,
    confidence: f64,
) -> Result<ShockSet, CurveError> {
    let b = params.loadings();
    let drift = params.conditional_mean(state, horizon) - state;
    let mean_reversion: Vec<f64> = (&b * drift).iter().copied().collect();

    let z = Normal::new(0.0, 1.0)
        .map_err(|e| CurveError::Numerical(format!("normal distribution: {e}")))?
        .inverse_cdf(confidence);

    // Principal components of the (level, slope) block of the horizon covariance.
    let cov = params.process_covariance(horizon);
    let block = cov.view((0, 0), (2, 2)).clone_owned();
    let eigen = SymmetricEigen::new(block);
    let mut order = [0usize, 1];
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

    let component = |k: usize| -> DVector<f64> {
        let idx = order[k];
        let size = z * eigen.eigenvalues[idx].max(0.0).sqrt();
        let mut dx = DVector::<f64>::zeros(FACTOR_COUNT);
        dx[0] = size * eigen.eigenvectors[(0, idx)];
        dx[1] = size * eigen.eigenvectors[(1, idx)];
        &b * dx
    };

    let mut level = component(0);
    let level_dir = eigen.eigenvectors[(0, order[0])];
    if level_dir < 0.0 {
        level = -level;
    }

    let mut twist = component(1);
    let n = twist.len();
    if twist[n - 1] - twist[0] < 0.0 {
        twist = -twist;
    }

    Ok(ShockSet {
        horizon,
        confidence,
        mean_reversion,
        level_up: level.iter().copied().collect(),
        level_down: level.iter().map(|v| -v).collect(),
        twist_steepen: twist.iter().copied().collect(),
        twist_flatten: twist.iter().map(|v| -v).collect(),
    })
}
