//! Dynamic Nelson–Siegel model.
//!
//! Three latent factors (level, slope, curvature) evolve as a mean-reverting
//! Gaussian process and are observed through the Nelson–Siegel loadings plus
//! independent noise per maturity. Calibration is by maximum likelihood:
//!
//! 1. two-step initialisation (λ profile, per-date OLS factors, AR(1) fits)
//! 2. quasi-Newton ascent on the Kalman-filter log-likelihood: the first step
//!    is a plain gradient step of size `lr`, later steps use BFGS curvature
//!    estimates; a step that does not improve the likelihood is halved
//!
//! A trained model draws seeded Monte-Carlo scenarios from the last filtered
//! state and decomposes the horizon covariance into level/twist shocks.

pub mod kalman;
pub mod params;
pub mod scenario;

pub use kalman::FilterOutput;
pub use params::{DnsParams, KAPPA_MIN};
pub use scenario::ShockSet;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::MaturityGrid;
use crate::error::CurveError;
use crate::fit::grid::{LambdaGrid, best_lambda};
use crate::math::basis::FACTOR_COUNT;
use crate::math::{combine, loadings};
use crate::models::dns::kalman::{filter, log_likelihood};
use crate::models::dns::params::LAMBDA_SLOT;
use crate::models::dns::scenario::{covariance_factor, decompose, simulate};

const MODEL: &str = "Dynamic Nelson-Siegel";

/// Minimum panel rows: one per factor.
pub const MIN_ROWS: usize = FACTOR_COUNT;

/// Default two-sided quantile used by [`DynamicNelsonSiegel::shock`].
pub const DEFAULT_SHOCK_CONFIDENCE: f64 = 0.995;

/// Sufficient-increase constant of the backtracking line search.
const ARMIJO: f64 = 1e-4;

/// Step halvings tried before a search direction is abandoned.
const MAX_HALVINGS: usize = 60;

/// Calibration controls.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Learning rate of the first (plain gradient) step; also the fallback
    /// scale whenever the curvature estimate is reset.
    pub lr: f64,
    /// Stop once an accepted step improves the log-likelihood by less than this.
    pub tol: f64,
    pub max_iter: usize,
    /// Log per-iteration progress at `info` instead of `debug`.
    pub disp: bool,
    /// Keep λ at its profiled value.
    pub fix_lambda: bool,
    pub lambda_grid: LambdaGrid,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            lr: 5e-8,
            tol: 1e-6,
            max_iter: 1000,
            disp: false,
            fix_lambda: false,
            lambda_grid: LambdaGrid::default(),
        }
    }
}

/// Outcome of the last `train` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub iterations: usize,
    pub initial_log_likelihood: f64,
    pub log_likelihood: f64,
    pub converged: bool,
    /// Effective gradient step size of the last accepted step.
    pub final_lr: f64,
}

#[derive(Debug, Clone)]
struct Trained {
    params: DnsParams,
    last_state: DVector<f64>,
    last_covariance: DMatrix<f64>,
    report: Option<TrainReport>,
}

/// Dynamic Nelson–Siegel model on a fixed maturity grid and time step.
#[derive(Debug, Clone)]
pub struct DynamicNelsonSiegel {
    dt: f64,
    maturities: MaturityGrid,
    trained: Option<Trained>,
}

impl DynamicNelsonSiegel {
    /// `dt` is the spacing of panel rows in years (e.g. `1/250` for daily data).
    pub fn new(dt: f64, maturities: &[f64]) -> Result<Self, CurveError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(CurveError::InvalidParameter { name: "dt", value: dt });
        }
        Ok(Self {
            dt,
            maturities: MaturityGrid::new(maturities.to_vec())?,
            trained: None,
        })
    }

    /// Rebuild a model from stored parameters, filtering `data` for the end state.
    pub fn restore(params: DnsParams, data: &DMatrix<f64>) -> Result<Self, CurveError> {
        let mut model = Self::new(params.dt, &params.maturities)?;
        model.check_panel(data)?;
        let out = filter(&params, data)?;
        model.trained = Some(Trained {
            params,
            last_state: out.last_state,
            last_covariance: out.last_covariance,
            report: None,
        });
        Ok(model)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn maturities(&self) -> &[f64] {
        self.maturities.as_slice()
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    pub fn params(&self) -> Option<&DnsParams> {
        self.trained.as_ref().map(|t| &t.params)
    }

    pub fn report(&self) -> Option<TrainReport> {
        self.trained.as_ref().and_then(|t| t.report)
    }

    /// Filtered factor state at the last panel row.
    pub fn last_state(&self) -> Result<&DVector<f64>, CurveError> {
        Ok(&self.trained()?.last_state)
    }

    /// Filtered factor covariance at the last panel row.
    pub fn last_covariance(&self) -> Result<&DMatrix<f64>, CurveError> {
        Ok(&self.trained()?.last_covariance)
    }

    /// One-step transition matrix `A(dt)`.
    pub fn transition(&self) -> Result<DMatrix<f64>, CurveError> {
        Ok(self.trained()?.params.transition(self.dt))
    }

    /// Observation loadings `B(λ)`.
    pub fn loadings(&self) -> Result<DMatrix<f64>, CurveError> {
        Ok(self.trained()?.params.loadings())
    }

    /// One-step process noise covariance `Q(dt)`.
    pub fn process_covariance(&self) -> Result<DMatrix<f64>, CurveError> {
        Ok(self.trained()?.params.process_covariance(self.dt))
    }

    pub fn observation_covariance(&self) -> Result<DMatrix<f64>, CurveError> {
        Ok(self.trained()?.params.observation_covariance())
    }

    /// Calibrate on `data` (rows = dates ascending, columns = maturities).
    pub fn train(&mut self, data: &DMatrix<f64>, lr: f64, tol: f64, disp: bool) -> Result<TrainReport, CurveError> {
        let options = TrainOptions {
            lr,
            tol,
            disp,
            ..TrainOptions::default()
        };
        self.train_with(data, &options)
    }

    /// Calibrate with explicit options.
    ///
    /// On `NonConvergence` the model keeps the last accepted parameters and
    /// can still be sampled.
    pub fn train_with(&mut self, data: &DMatrix<f64>, options: &TrainOptions) -> Result<TrainReport, CurveError> {
        if !(options.lr.is_finite() && options.lr > 0.0) {
            return Err(CurveError::InvalidParameter {
                name: "lr",
                value: options.lr,
            });
        }
        if !(options.tol.is_finite() && options.tol > 0.0) {
            return Err(CurveError::InvalidParameter {
                name: "tol",
                value: options.tol,
            });
        }
        self.check_panel(data)?;
        self.trained = None;

        let init = self.initial_params(data, &options.lambda_grid)?;
        let mut p = DVector::from_vec(init.to_vector());
        let mut ll = log_likelihood(&init, data);
        if !ll.is_finite() {
            return Err(CurveError::Numerical(
                "log-likelihood is not finite at the initial parameters".to_string(),
            ));
        }
        let initial_ll = ll;
        let n = p.len();
        let mut grad = gradient(&init, &p, data, options.fix_lambda);

        // Inverse-curvature estimate; `lr·I` makes the first step a plain gradient step.
        let mut scale = options.lr;
        let mut h_inv = DMatrix::<f64>::identity(n, n) * scale;
        let mut fresh = true;
        // Until one curvature pair is seen the step length is `lr` itself, which
        // says nothing about how close the optimum is.
        let mut scaled = false;
        let mut lr = options.lr;
        let mut last_change = f64::INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        debug!(lambda = init.lambda, log_likelihood = ll, "DNS initialised");

        while iterations < options.max_iter {
            iterations += 1;
            let mut direction = &h_inv * &grad;
            let mut slope = grad.dot(&direction);
            if !(slope.is_finite() && slope > 0.0) {
                h_inv = DMatrix::identity(n, n) * scale;
                fresh = true;
                direction = &grad * scale;
                slope = grad.dot(&direction);
            }
            if !(slope > 0.0) {
                // Zero gradient.
                converged = true;
                break;
            }

            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                let candidate = &p + &direction * step;
                let ll_new = log_likelihood(&init.with_vector(candidate.as_slice()), data);
                if ll_new.is_finite() && ll_new >= ll + ARMIJO * step * slope {
                    accepted = Some((candidate, ll_new));
                    break;
                }
                step *= 0.5;
            }

            let Some((candidate, ll_new)) = accepted else {
                if fresh {
                    // No ascent direction left at machine precision.
                    converged = true;
                    break;
                }
                h_inv = DMatrix::identity(n, n) * scale;
                fresh = true;
                progress(options.disp, iterations, ll, lr, last_change);
                continue;
            };

            let grad_new = gradient(&init, &candidate, data, options.fix_lambda);
            let s = &candidate - &p;
            let y = &grad - &grad_new;
            let sy = s.dot(&y);
            if sy > f64::EPSILON * s.norm() * y.norm() {
                scale = sy / y.norm_squared();
                if fresh {
                    h_inv = DMatrix::identity(n, n) * scale;
                }
                let rho = 1.0 / sy;
                let hy = &h_inv * &y;
                let yhy = y.dot(&hy);
                h_inv -= (&s * hy.transpose() + &hy * s.transpose()) * rho;
                h_inv += (&s * s.transpose()) * (rho * rho * yhy + rho);
                fresh = false;
            }

            lr = step * slope / grad.norm_squared();
            last_change = ll_new - ll;
            p = candidate;
            ll = ll_new;
            grad = grad_new;
            progress(options.disp, iterations, ll, lr, last_change);
            let informed = scaled;
            scaled |= !fresh;
            if informed && last_change < options.tol {
                converged = true;
                break;
            }
        }

        let params = init.with_vector(p.as_slice());
        let out = filter(&params, data)?;
        let report = TrainReport {
            iterations,
            initial_log_likelihood: initial_ll,
            log_likelihood: out.log_likelihood,
            converged,
            final_lr: lr,
        };
        self.trained = Some(Trained {
            params,
            last_state: out.last_state,
            last_covariance: out.last_covariance,
            report: Some(report),
        });

        if !converged {
            return Err(CurveError::NonConvergence {
                model: MODEL,
                iterations,
                tolerance: options.tol,
                last_change,
            });
        }
        Ok(report)
    }

    /// Two-step starting values: profiled λ, OLS factors, AR(1) dynamics.
    pub fn initial_params(&self, data: &DMatrix<f64>, grid: &LambdaGrid) -> Result<DnsParams, CurveError> {
        self.check_panel(data)?;
        let maturities = self.maturities.as_slice();
        let rows: Vec<Vec<f64>> = data.row_iter().map(|r| r.iter().copied().collect()).collect();
        let profile = best_lambda(maturities, &rows, grid)?;
        let factors = &profile.factors;
        let t_len = factors.len() as f64;

        let mut theta = [0.0; FACTOR_COUNT];
        for f in factors {
            for i in 0..FACTOR_COUNT {
                theta[i] += f[i] / t_len;
            }
        }

        let demeaned: Vec<[f64; FACTOR_COUNT]> = factors
            .iter()
            .map(|f| [f[0] - theta[0], f[1] - theta[1], f[2] - theta[2]])
            .collect();

        let mut phi = [0.0; FACTOR_COUNT];
        let mut kappa = [0.0; FACTOR_COUNT];
        for i in 0..FACTOR_COUNT {
            let (num, den) = demeaned
                .windows(2)
                .fold((0.0, 0.0), |(n, d), w| (n + w[1][i] * w[0][i], d + w[0][i] * w[0][i]));
            let a = if den > 0.0 { num / den } else { 0.5 };
            phi[i] = a.clamp(1e-6, 1.0 - 1e-8);
            kappa[i] = (-phi[i].ln() / self.dt).clamp(2.0 * KAPPA_MIN, 1e4);
        }

        // Residual covariance of the AR(1) fits estimates Q(dt); map it back to ΣΣ'.
        let resid: Vec<[f64; FACTOR_COUNT]> = demeaned
            .windows(2)
            .map(|w| std::array::from_fn(|i| w[1][i] - phi[i] * w[0][i]))
            .collect();
        let n_resid = resid.len().max(1) as f64;
        let diffusion = DMatrix::from_fn(FACTOR_COUNT, FACTOR_COUNT, |i, j| {
            let q_ij = resid.iter().map(|e| e[i] * e[j]).sum::<f64>() / n_resid;
            let k = kappa[i] + kappa[j];
            q_ij * k / -(-k * self.dt).exp_m1()
        });
        let chol = covariance_factor(&diffusion).unwrap_or_else(|_| {
            DMatrix::from_fn(FACTOR_COUNT, FACTOR_COUNT, |i, j| {
                if i == j { diffusion[(i, i)].max(0.0).sqrt() } else { 0.0 }
            })
        });
        let scale = data.iter().map(|v| v.abs()).sum::<f64>() / data.len() as f64;
        let sigma_floor = (1e-6 * scale).max(1e-10);
        let sigma = [
            chol[(0, 0)].max(sigma_floor),
            chol[(1, 0)],
            chol[(1, 1)].max(sigma_floor),
            chol[(2, 0)],
            chol[(2, 1)],
            chol[(2, 2)].max(sigma_floor),
        ];

        let obs_floor = (1e-4 * scale).max(1e-10);
        let obs_std = (0..maturities.len())
            .map(|j| {
                let w = loadings(maturities[j], profile.lambda);
                let sse: f64 = factors
                    .iter()
                    .zip(data.column(j).iter())
                    .map(|(f, y)| (y - combine(f, &w)).powi(2))
                    .sum();
                (sse / t_len).sqrt().max(obs_floor)
            })
            .collect();

        Ok(DnsParams {
            dt: self.dt,
            maturities: maturities.to_vec(),
            lambda: profile.lambda,
            theta,
            kappa,
            sigma,
            obs_std,
        })
    }

    /// Draw `num` rate vectors `time` years ahead of the last panel row.
    ///
    /// Rows are scenarios, columns are maturities, in the units of the
    /// training panel. Observation noise is not added.
    pub fn sample(&self, time: f64, num: usize, seed: u32) -> Result<DMatrix<f64>, CurveError> {
        let trained = self.trained()?;
        if !(time.is_finite() && time > 0.0) {
            return Err(CurveError::InvalidParameter { name: "time", value: time });
        }
        if num == 0 {
            return Err(CurveError::InvalidParameter { name: "num", value: 0.0 });
        }
        let steps = ((time / self.dt).round() as usize).max(1);
        debug!(steps, num, seed, "sampling DNS scenarios");
        simulate(&trained.params, &trained.last_state, steps, num, seed)
    }

    /// Shock decomposition over `time` years at the default confidence.
    pub fn shock(&self, time: f64) -> Result<ShockSet, CurveError> {
        self.shock_with_confidence(time, DEFAULT_SHOCK_CONFIDENCE)
    }

    pub fn shock_with_confidence(&self, time: f64, confidence: f64) -> Result<ShockSet, CurveError> {
        let trained = self.trained()?;
        if !(time.is_finite() && time > 0.0) {
            return Err(CurveError::InvalidParameter { name: "time", value: time });
        }
        if !(confidence > 0.5 && confidence < 1.0) {
            return Err(CurveError::InvalidParameter {
                name: "confidence",
                value: confidence,
            });
        }
        decompose(&trained.params, &trained.last_state, time, confidence)
    }

    fn trained(&self) -> Result<&Trained, CurveError> {
        self.trained.as_ref().ok_or(CurveError::NotCalibrated { model: MODEL })
    }

    fn check_panel(&self, data: &DMatrix<f64>) -> Result<(), CurveError> {
        if data.ncols() != self.maturities.len() {
            return Err(CurveError::input_shape(format!(
                "panel has {} columns but the model has {} maturities",
                data.ncols(),
                self.maturities.len()
            )));
        }
        if data.nrows() < MIN_ROWS {
            return Err(CurveError::DataInsufficiency {
                model: MODEL,
                rows: data.nrows(),
                required: MIN_ROWS,
            });
        }
        if let Some(bad) = data.iter().find(|v| !v.is_finite()) {
            return Err(CurveError::input_shape(format!("panel contains non-finite value {bad}")));
        }
        Ok(())
    }
}

/// Central-difference gradient of the log-likelihood in the unconstrained space.
fn gradient(base: &DnsParams, p: &DVector<f64>, data: &DMatrix<f64>, fix_lambda: bool) -> DVector<f64> {
    let mut x = p.as_slice().to_vec();
    DVector::from_fn(p.len(), |k, _| {
        if fix_lambda && k == LAMBDA_SLOT {
            return 0.0;
        }
        let h = 1e-5 * p[k].abs().max(1.0);
        x[k] = p[k] + h;
        let up = log_likelihood(&base.with_vector(&x), data);
        x[k] = p[k] - h;
        let down = log_likelihood(&base.with_vector(&x), data);
        x[k] = p[k];
        let g = (up - down) / (2.0 * h);
        if g.is_finite() { g } else { 0.0 }
    })
}

fn progress(disp: bool, iteration: usize, ll: f64, lr: f64, change: f64) {
    if disp {
        info!(iteration, log_likelihood = ll, lr, change, "DNS training");
    } else {
        debug!(iteration, log_likelihood = ll, lr, change, "DNS training");
    }
}
