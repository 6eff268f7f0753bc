//! Parameterisation of the dynamic Nelson–Siegel state-space model.
//!
//! Factors `x = (level, slope, curvature)` follow a mean-reverting
//! Ornstein–Uhlenbeck process with diagonal speed `K = diag(κ)` and diffusion
//! `Σ` (lower triangular). Over a step `Δ` the exact discretisation is
//!
//! ```text
//! x_{t+Δ} = θ + A(Δ)(x_t - θ) + η,   A(Δ) = diag(e^{-κ_i Δ})
//! η ~ N(0, Q(Δ)),   Q_ij(Δ) = (ΣΣ')_ij (1 - e^{-(κ_i+κ_j)Δ}) / (κ_i + κ_j)
//! ```
//!
//! Observations are `y = B(λ) x + ε`, `ε ~ N(0, diag(h²))`.
//!
//! The optimiser works on an unconstrained vector:
//! `[ln λ, θ(3), ln(κ - κ_min)(3), Σ (ln on the diagonal)(6), ln h(n)]`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::math::basis::FACTOR_COUNT;
use crate::math::loading_matrix;

/// Floor on mean-reversion speeds (per year).
pub const KAPPA_MIN: f64 = 1e-3;

/// Lower-triangular storage order of `Σ`: `(row, col)` pairs, row-major.
const SIGMA_INDEX: [(usize, usize); 6] = [(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)];

/// Position of `ln λ` in the unconstrained vector.
pub(crate) const LAMBDA_SLOT: usize = 0;

/// Calibrated (or initial) model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsParams {
    /// Calibration time step (years).
    pub dt: f64,
    pub maturities: Vec<f64>,
    /// Loading decay scale (years).
    pub lambda: f64,
    /// Long-run factor means.
    pub theta: [f64; FACTOR_COUNT],
    /// Mean-reversion speeds (per year).
    pub kappa: [f64; FACTOR_COUNT],
    /// Lower-triangular diffusion, row-major `[s11, s21, s22, s31, s32, s33]`.
    pub sigma: [f64; 6],
    /// Observation noise standard deviation per maturity.
    pub obs_std: Vec<f64>,
}

impl DnsParams {
    pub fn sigma_matrix(&self) -> DMatrix<f64> {
        let mut s = DMatrix::<f64>::zeros(FACTOR_COUNT, FACTOR_COUNT);
        for (k, &(i, j)) in SIGMA_INDEX.iter().enumerate() {
            s[(i, j)] = self.sigma[k];
        }
        s
    }

    /// `ΣΣ'`, the instantaneous factor covariance.
    pub fn diffusion_covariance(&self) -> DMatrix<f64> {
        let s = self.sigma_matrix();
        &s * s.transpose()
    }

    /// Loading matrix `B(λ)` (maturities × 3).
    pub fn loadings(&self) -> DMatrix<f64> {
        loading_matrix(&self.maturities, self.lambda)
    }

    /// State transition `A(Δ)`.
    pub fn transition(&self, horizon: f64) -> DMatrix<f64> {
        DMatrix::from_fn(FACTOR_COUNT, FACTOR_COUNT, |i, j| {
            if i == j { (-self.kappa[i] * horizon).exp() } else { 0.0 }
        })
    }

    /// Conditional covariance `Q(Δ)` of the factors after `horizon` years.
    pub fn process_covariance(&self, horizon: f64) -> DMatrix<f64> {
        let ss = self.diffusion_covariance();
        DMatrix::from_fn(FACTOR_COUNT, FACTOR_COUNT, |i, j| {
            let k = self.kappa[i] + self.kappa[j];
            ss[(i, j)] * -(-k * horizon).exp_m1() / k
        })
    }

    /// Unconditional covariance, the `Δ → ∞` limit of [`process_covariance`](Self::process_covariance).
    pub fn stationary_covariance(&self) -> DMatrix<f64> {
        let ss = self.diffusion_covariance();
        DMatrix::from_fn(FACTOR_COUNT, FACTOR_COUNT, |i, j| {
            ss[(i, j)] / (self.kappa[i] + self.kappa[j])
        })
    }

    /// Observation noise covariance `diag(h²)`.
    pub fn observation_covariance(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_iterator(
            self.obs_std.len(),
            self.obs_std.iter().map(|h| h * h),
        ))
    }

    /// `E[x_{t+horizon} | x_t]`.
    pub fn conditional_mean(&self, x: &DVector<f64>, horizon: f64) -> DVector<f64> {
        DVector::from_fn(FACTOR_COUNT, |i, _| {
            self.theta[i] + (-self.kappa[i] * horizon).exp() * (x[i] - self.theta[i])
        })
    }

    pub fn theta_vector(&self) -> DVector<f64> {
        DVector::from_row_slice(&self.theta)
    }

    /// Number of free parameters in the unconstrained vector.
    pub(crate) fn vector_len(n_maturities: usize) -> usize {
        1 + FACTOR_COUNT + FACTOR_COUNT + SIGMA_INDEX.len() + n_maturities
    }

    pub(crate) fn to_vector(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(Self::vector_len(self.obs_std.len()));
        v.push(self.lambda.ln());
        v.extend_from_slice(&self.theta);
        v.extend(self.kappa.iter().map(|k| (k - KAPPA_MIN).max(1e-12).ln()));
        for (k, &(i, j)) in SIGMA_INDEX.iter().enumerate() {
            let s = self.sigma[k];
            v.push(if i == j { s.max(1e-300).ln() } else { s });
        }
        v.extend(self.obs_std.iter().map(|h| h.ln()));
        v
    }

    /// Rebuild from an unconstrained vector; `dt` and maturities come from `self`.
    pub(crate) fn with_vector(&self, v: &[f64]) -> DnsParams {
        let mut at = 0;
        let mut next = || {
            let x = v[at];
            at += 1;
            x
        };

        let lambda = next().exp();
        let theta = [next(), next(), next()];
        let kappa = [
            KAPPA_MIN + next().exp(),
            KAPPA_MIN + next().exp(),
            KAPPA_MIN + next().exp(),
        ];
        let mut sigma = [0.0; 6];
        for (k, &(i, j)) in SIGMA_INDEX.iter().enumerate() {
            let x = next();
            sigma[k] = if i == j { x.exp() } else { x };
        }
        let obs_std = (0..self.obs_std.len()).map(|_| next().exp()).collect();

        DnsParams {
            dt: self.dt,
            maturities: self.maturities.clone(),
            lambda,
            theta,
            kappa,
            sigma,
            obs_std,
        }
    }
}
