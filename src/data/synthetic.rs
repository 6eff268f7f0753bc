//! Seeded synthetic rate panels.
//!
//! Factors follow a slowly mean-reverting walk around a typical upward
//! sloping curve (percent units); each business day's rates are the
//! Nelson–Siegel combination of the factors plus Gaussian observation noise.
//! Useful for demos and for exercising the dynamic model without market data.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{MaturityGrid, RatePanel, SyntheticConfig};
use crate::error::CurveError;
use crate::math::basis::FACTOR_COUNT;
use crate::math::{combine, loadings};

/// Long-run factor levels (level, slope, curvature), percent.
const FACTOR_MEAN: [f64; FACTOR_COUNT] = [3.0, -1.5, 0.5];

/// Daily pull towards [`FACTOR_MEAN`], about 0.25 per year: over a one-year
/// horizon the factors behave close to a random walk.
const DAILY_REVERSION: f64 = 0.001;

pub fn generate_panel(config: &SyntheticConfig) -> Result<RatePanel, CurveError> {
    if config.rows == 0 {
        return Err(CurveError::InvalidParameter {
            name: "rows",
            value: 0.0,
        });
    }
    if !(config.lambda.is_finite() && config.lambda > 0.0) {
        return Err(CurveError::InvalidParameter {
            name: "lambda",
            value: config.lambda,
        });
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(CurveError::InvalidParameter {
            name: "noise",
            value: config.noise,
        });
    }
    let maturities = MaturityGrid::new(config.maturities.clone())?;
    let weights: Vec<[f64; FACTOR_COUNT]> = maturities
        .as_slice()
        .iter()
        .map(|&t| loadings(t, config.lambda))
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| CurveError::Numerical(format!("noise distribution: {e}")))?;

    let dates = business_days(config.start, config.rows);
    let mut factors = FACTOR_MEAN;
    let mut rates = DMatrix::<f64>::zeros(config.rows, maturities.len());

    for i in 0..config.rows {
        for k in 0..FACTOR_COUNT {
            let shock = config.factor_vol[k] * normal.sample(&mut rng);
            factors[k] += DAILY_REVERSION * (FACTOR_MEAN[k] - factors[k]) + shock;
        }
        for (j, w) in weights.iter().enumerate() {
            rates[(i, j)] = combine(&factors, w) + config.noise * normal.sample(&mut rng);
        }
    }

    RatePanel::new(dates, maturities, rates)
}

/// `n` consecutive weekdays starting at (or after) `start`.
fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(seed: u64) -> SyntheticConfig {
        SyntheticConfig {
            out: PathBuf::from("unused.csv"),
            rows: 120,
            seed,
            start: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            maturities: vec![1.0, 3.0, 5.0, 10.0, 20.0, 30.0],
            lambda: 1.8,
            factor_vol: [0.03, 0.02, 0.02],
            noise: 0.005,
        }
    }

    #[test]
    fn panel_shape_and_weekdays() {
        let panel = generate_panel(&config(42)).unwrap();
        assert_eq!(panel.rates.shape(), (120, 6));
        assert_eq!(panel.dates.len(), 120);
        assert!(
            panel
                .dates
                .iter()
                .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        );
        // 2024-01-05 is a Friday; the next row skips the weekend.
        assert_eq!(panel.dates[1], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert!(panel.rates.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn generation_is_seeded() {
        let a = generate_panel(&config(7)).unwrap();
        let b = generate_panel(&config(7)).unwrap();
        let c = generate_panel(&config(8)).unwrap();
        assert_eq!(a.rates, b.rates);
        assert_ne!(a.rates, c.rates);
    }

    #[test]
    fn rates_stay_near_the_long_run_curve() {
        let panel = generate_panel(&config(1)).unwrap();
        let long = panel.rates.column(5).mean();
        assert!((long - 3.0).abs() < 1.0, "30y mean {long}");
    }

    #[test]
    fn zero_rows_rejected() {
        let mut cfg = config(1);
        cfg.rows = 0;
        assert!(generate_panel(&cfg).is_err());
    }
}
