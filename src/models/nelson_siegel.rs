//! Static Nelson–Siegel curve.
//!
//! `y(t) = β0 + β1·f1(t/λ) + β2·f2(t/λ)` with the loadings from
//! [`crate::math::basis`]. Fitting minimises the sum of squared yield residuals
//! over `(β0, β1, β2, λ)` with Nelder–Mead; `λ` is optimised on a log scale so
//! it stays positive.
//!
//! Starting point:
//! 1. heuristic betas from the short, medium and long pillars
//! 2. OLS betas profiled over a log-spaced `λ` grid
//!
//! whichever has the lower SSE seeds the simplex.

use serde::{Deserialize, Serialize};

use crate::domain::check_pillars;
use crate::error::CurveError;
use crate::fit::grid::{LambdaGrid, best_lambda};
use crate::math::basis::{FACTOR_COUNT, combine, forward_loadings, loadings};
use crate::math::check_maturity;
use crate::math::simplex::{SimplexOptions, minimize};
use crate::models::YieldCurve;

const MODEL: &str = "Nelson-Siegel";

/// Parameter count `(β0, β1, β2, λ)`.
pub const NS_PARAM_COUNT: usize = 4;

/// Fitted Nelson–Siegel parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NelsonSiegelParams {
    /// Level `β0` (long-end limit).
    pub beta0: f64,
    /// Slope `β1` (`y(0) - β0`).
    pub beta1: f64,
    /// Curvature `β2`.
    pub beta2: f64,
    /// Decay scale `λ` in years (hump location).
    pub lambda: f64,
}

impl NelsonSiegelParams {
    pub fn betas(&self) -> [f64; FACTOR_COUNT] {
        [self.beta0, self.beta1, self.beta2]
    }

    /// Model yield at `t` (no domain checks).
    pub fn yield_at(&self, t: f64) -> f64 {
        combine(&self.betas(), &loadings(t, self.lambda))
    }
}

/// Fit controls.
#[derive(Debug, Clone)]
pub struct NelsonSiegelOptions {
    pub simplex: SimplexOptions,
    pub lambda_grid: LambdaGrid,
}

impl Default for NelsonSiegelOptions {
    fn default() -> Self {
        Self {
            simplex: SimplexOptions {
                max_iter: 10_000,
                f_tol: 1e-18,
                x_tol: 1e-10,
                initial_step: 0.05,
            },
            lambda_grid: LambdaGrid::default(),
        }
    }
}

/// Diagnostics of the last successful fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NelsonSiegelFit {
    pub sse: f64,
    pub rmse: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NelsonSiegelCurve {
    options: NelsonSiegelOptions,
    params: Option<NelsonSiegelParams>,
    last_fit: Option<NelsonSiegelFit>,
}

impl NelsonSiegelCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NelsonSiegelOptions) -> Self {
        Self {
            options,
            params: None,
            last_fit: None,
        }
    }

    /// Curve from known parameters.
    pub fn new_with_params(params: NelsonSiegelParams) -> Result<Self, CurveError> {
        if !(params.lambda > 0.0 && params.lambda.is_finite()) {
            return Err(CurveError::InvalidParameter {
                name: "lambda",
                value: params.lambda,
            });
        }
        Ok(Self {
            options: NelsonSiegelOptions::default(),
            params: Some(params),
            last_fit: None,
        })
    }

    pub fn params(&self) -> Option<NelsonSiegelParams> {
        self.params
    }

    pub fn last_fit(&self) -> Option<NelsonSiegelFit> {
        self.last_fit
    }

    /// Fit to observed pillars, replacing any previous parameters.
    ///
    /// Returns [`CurveError::NonConvergence`] when the simplex exhausts its
    /// iteration budget; the curve is then left unfitted.
    pub fn fit(&mut self, maturities: &[f64], rates: &[f64]) -> Result<NelsonSiegelFit, CurveError> {
        self.params = None;
        self.last_fit = None;

        let grid = check_pillars(maturities, rates)?;
        if grid.len() < NS_PARAM_COUNT {
            return Err(CurveError::DataInsufficiency {
                model: MODEL,
                rows: grid.len(),
                required: NS_PARAM_COUNT,
            });
        }
        let t = grid.as_slice();

        let sse_of = |p: &NelsonSiegelParams| -> f64 {
            t.iter()
                .zip(rates.iter())
                .map(|(&ti, &yi)| {
                    let r = yi - p.yield_at(ti);
                    r * r
                })
                .sum()
        };

        let start = self.starting_point(t, rates, &sse_of)?;
        let x0 = [start.beta0, start.beta1, start.beta2, start.lambda.ln()];
        let unpack = |x: &[f64]| NelsonSiegelParams {
            beta0: x[0],
            beta1: x[1],
            beta2: x[2],
            lambda: x[3].exp(),
        };

        let min = minimize(|x| sse_of(&unpack(x)), &x0, &self.options.simplex, MODEL)?;
        let params = unpack(&min.x);
        let fit = NelsonSiegelFit {
            sse: min.value,
            rmse: (min.value / t.len() as f64).sqrt(),
            iterations: min.iterations,
        };

        tracing::debug!(
            beta0 = params.beta0,
            beta1 = params.beta1,
            beta2 = params.beta2,
            lambda = params.lambda,
            rmse = fit.rmse,
            iterations = fit.iterations,
            "nelson-siegel fit"
        );

        self.params = Some(params);
        self.last_fit = Some(fit);
        Ok(fit)
    }

    fn starting_point<F>(&self, t: &[f64], rates: &[f64], sse_of: &F) -> Result<NelsonSiegelParams, CurveError>
    where
        F: Fn(&NelsonSiegelParams) -> f64,
    {
        let n = t.len();
        let short = rates[0];
        let long = rates[n - 1];
        let medium = rates[n / 2];

        let profile = best_lambda(t, &[rates.to_vec()], &self.options.lambda_grid)?;

        let heuristic = NelsonSiegelParams {
            beta0: long,
            beta1: short - long,
            beta2: 2.0 * medium - short - long,
            lambda: profile.lambda,
        };
        let [b0, b1, b2] = profile.factors[0];
        let profiled = NelsonSiegelParams {
            beta0: b0,
            beta1: b1,
            beta2: b2,
            lambda: profile.lambda,
        };

        if sse_of(&profiled) <= sse_of(&heuristic) {
            Ok(profiled)
        } else {
            Ok(heuristic)
        }
    }

    fn fitted(&self) -> Result<&NelsonSiegelParams, CurveError> {
        self.params
            .as_ref()
            .ok_or(CurveError::NotCalibrated { model: MODEL })
    }

    /// Analytic instantaneous forward `β0 + β1 e^{-x} + β2 x e^{-x}`, `x = t/λ`.
    pub fn instantaneous_forward(&self, t: f64) -> Result<f64, CurveError> {
        check_maturity(t)?;
        let p = self.fitted()?;
        Ok(combine(&p.betas(), &forward_loadings(t, p.lambda)))
    }
}

impl YieldCurve for NelsonSiegelCurve {
    fn spot_rate(&self, t: f64) -> Result<f64, CurveError> {
        check_maturity(t)?;
        Ok(self.fitted()?.yield_at(t))
    }
}
