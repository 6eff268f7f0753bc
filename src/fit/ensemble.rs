//! Scenario ensemble: one Smith–Wilson curve per sampled rate vector.
//!
//! Scenarios are independent, so they are fitted in parallel. Each rayon
//! worker owns a single `SmithWilsonCurve` and refits it in place for every
//! scenario it processes; results come back in scenario order.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{MaturityGrid, check_pillars};
use crate::error::CurveError;
use crate::models::{SmithWilsonCurve, YieldCurve};

/// Spot and forward curves of every scenario (rows) on the query grid (columns).
#[derive(Debug, Clone)]
pub struct ScenarioCurves {
    pub spot: DMatrix<f64>,
    pub forward: DMatrix<f64>,
}

impl ScenarioCurves {
    pub fn n_scenarios(&self) -> usize {
        self.spot.nrows()
    }
}

/// Fit a Smith–Wilson curve through each row of `scenarios` (decimal rates)
/// and evaluate spot and forward rates (span `h`) at `query`.
pub fn build_scenario_curves(
    alpha: f64,
    ltfr: f64,
    maturities: &[f64],
    scenarios: &DMatrix<f64>,
    query: &[f64],
    h: f64,
) -> Result<ScenarioCurves, CurveError> {
    let template = SmithWilsonCurve::new(alpha, ltfr)?;
    if scenarios.ncols() != maturities.len() {
        return Err(CurveError::input_shape(format!(
            "scenarios have {} columns but {} maturities were given",
            scenarios.ncols(),
            maturities.len()
        )));
    }
    if MaturityGrid::has_duplicates(maturities) {
        return Err(CurveError::SingularFit {
            maturities: maturities.to_vec(),
        });
    }
    check_pillars(maturities, &vec![0.0; maturities.len()])?;

    let rows: Vec<(Vec<f64>, Vec<f64>)> = (0..scenarios.nrows())
        .into_par_iter()
        .map_init(
            || template.clone(),
            |curve, i| {
                let rates: Vec<f64> = scenarios.row(i).iter().copied().collect();
                curve.fit(maturities, &rates)?;
                Ok((curve.spot_rates(query)?, curve.forward_rates(query, h)?))
            },
        )
        .collect::<Result<_, CurveError>>()?;

    let n = rows.len();
    let m = query.len();
    let mut spot = DMatrix::<f64>::zeros(n, m);
    let mut forward = DMatrix::<f64>::zeros(n, m);
    for (i, (s, f)) in rows.iter().enumerate() {
        for j in 0..m {
            spot[(i, j)] = s[j];
            forward[(i, j)] = f[j];
        }
    }

    Ok(ScenarioCurves { spot, forward })
}
