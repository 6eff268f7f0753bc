//! Grids: query maturities and the decay (`λ`) profile search.
//!
//! The `λ` search is a deterministic grid over log-spaced candidates. For each
//! candidate the model is linear in the factors, so every row of rates is
//! regressed on the loadings by OLS and the candidate is scored by total SSE.
//! It seeds both the static Nelson–Siegel optimiser and the dynamic model's
//! initial loading matrix.

use rayon::prelude::*;

use crate::error::CurveError;
use crate::math::basis::FACTOR_COUNT;
use crate::math::{factor_regression, loading_matrix};

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, CurveError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) {
        return Err(CurveError::input_shape(format!(
            "invalid log grid range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(CurveError::input_shape("log grid needs at least 2 steps"));
    }

    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// `n` evenly spaced points on `[start, end]` (inclusive).
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n as f64 - 1.0);
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Default query grid: 1201 points over `[0, 100]` years (monthly spacing).
pub fn default_query_grid() -> Vec<f64> {
    linspace(0.0, 100.0, 1201)
}

/// Log-spaced `λ` candidates (years).
#[derive(Debug, Clone, Copy)]
pub struct LambdaGrid {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl Default for LambdaGrid {
    fn default() -> Self {
        Self {
            min: 0.05,
            max: 30.0,
            steps: 80,
        }
    }
}

/// Best `λ` on the grid together with the per-row OLS factors.
#[derive(Debug, Clone)]
pub struct LambdaProfile {
    pub lambda: f64,
    pub factors: Vec<[f64; FACTOR_COUNT]>,
    pub sse: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    lambda: f64,
    factors: Vec<[f64; FACTOR_COUNT]>,
    sse: f64,
}

/// Search the grid for the `λ` minimising total OLS SSE across `rows`.
pub fn best_lambda(maturities: &[f64], rows: &[Vec<f64>], grid: &LambdaGrid) -> Result<LambdaProfile, CurveError> {
    if rows.is_empty() {
        return Err(CurveError::input_shape("no rate rows for lambda search"));
    }
    let lambdas = log_space(grid.min, grid.max, grid.steps)?;

    // Evaluate each candidate independently (parallel).
    let candidates: Vec<Candidate> = lambdas
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &lambda)| {
            let design = loading_matrix(maturities, lambda);
            let mut factors = Vec::with_capacity(rows.len());
            let mut sse = 0.0;
            for row in rows {
                let (beta, row_sse) = factor_regression(&design, row)?;
                factors.push(beta);
                sse += row_sse;
            }
            sse.is_finite().then_some(Candidate {
                idx,
                lambda,
                factors,
                sse,
            })
        })
        .collect();

    // Deterministic selection: minimum SSE; ties broken by grid index.
    let best = candidates
        .into_iter()
        .min_by(|a, b| a.sse.total_cmp(&b.sse).then(a.idx.cmp(&b.idx)))
        .ok_or_else(|| CurveError::Numerical("no admissible lambda on the search grid".to_string()))?;

    Ok(LambdaProfile {
        lambda: best.lambda,
        factors: best.factors,
        sse: best.sse,
    })
}
