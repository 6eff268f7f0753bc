//! Shared run logic behind the `esg` subcommands.
//!
//! Keeping the workflows here (rather than in the command handlers) means
//! they return plain data and can be tested without capturing stdout:
//!
//! - static: pillars -> Smith-Wilson / Nelson-Siegel fit -> spot/forward grid
//! - dynamic: panel -> DNS train -> sample -> Smith-Wilson ensemble + base curve + shocks
//! - synth: seeded panel -> CSV

use nalgebra::DMatrix;
use tracing::{debug, info, warn};

use crate::data::generate_panel;
use crate::domain::{
    CurveGrid, CurveParams, DnsRunConfig, ModelKind, RatePanel, RateUnit, StaticRunConfig, SyntheticConfig,
};
use crate::error::{AppError, CurveError};
use crate::fit::{ScenarioCurves, build_scenario_curves, linspace};
use crate::io::{PanelData, load_panel, write_panel_csv};
use crate::models::{
    DnsParams, DynamicNelsonSiegel, NelsonSiegelCurve, NelsonSiegelFit, ShockSet, SmithWilsonCurve, TrainOptions,
    TrainReport, YieldCurve,
};

/// Outputs of a one-shot static curve run.
#[derive(Debug, Clone)]
pub struct StaticRun {
    pub model: ModelKind,
    pub maturities: Vec<f64>,
    /// Observed pillar rates (decimals).
    pub rates: Vec<f64>,
    /// Model spot rates at the pillars.
    pub fitted: Vec<f64>,
    pub params: CurveParams,
    pub grid: CurveGrid,
    pub ns_fit: Option<NelsonSiegelFit>,
}

/// Outputs of a dynamic Nelson-Siegel run.
#[derive(Debug, Clone)]
pub struct DnsRun {
    pub panel: PanelData,
    pub unit: RateUnit,
    pub report: Option<TrainReport>,
    pub converged: bool,
    pub params: DnsParams,
    /// Sampled rate vectors, converted to decimals (rows = scenarios).
    pub scenarios: DMatrix<f64>,
    pub curves: ScenarioCurves,
    /// Smith-Wilson fit of the last panel row.
    pub base: CurveGrid,
    /// Shock decomposition in the panel's units.
    pub shock: ShockSet,
}

/// Evaluate spot and forward rates of `curve` on `query`.
pub fn curve_grid(curve: &impl YieldCurve, query: &[f64], forward_tenor: f64) -> Result<CurveGrid, CurveError> {
    Ok(CurveGrid {
        tenor_years: query.to_vec(),
        spot: curve.spot_rates(query)?,
        forward: curve.forward_rates(query, forward_tenor)?,
        forward_tenor,
    })
}

/// Query grid `[0, horizon]` with `points` nodes.
pub fn query_grid(horizon: f64, points: usize) -> Result<Vec<f64>, AppError> {
    if !(horizon.is_finite() && horizon > 0.0) {
        return Err(AppError::new(2, format!("Query horizon must be > 0 (got {horizon}).")));
    }
    if points < 2 {
        return Err(AppError::new(2, "Query grid needs at least 2 points."));
    }
    Ok(linspace(0.0, horizon, points))
}

/// Fit a Smith-Wilson or Nelson-Siegel curve through the configured pillars.
pub fn run_static(config: &StaticRunConfig) -> Result<StaticRun, AppError> {
    let query = query_grid(config.horizon, config.points)?;

    let (params, grid, fitted, ns_fit) = match config.model {
        ModelKind::Sw => {
            let mut sw = SmithWilsonCurve::new(config.alpha, config.ltfr)?;
            sw.fit(&config.maturities, &config.rates)?;
            let params = sw
                .params()
                .ok_or(CurveError::NotCalibrated { model: "Smith-Wilson" })?;
            (
                CurveParams::SmithWilson(params),
                curve_grid(&sw, &query, config.forward_tenor)?,
                sw.spot_rates(&config.maturities)?,
                None,
            )
        }
        ModelKind::Ns => {
            let mut ns = NelsonSiegelCurve::new();
            let fit = ns.fit(&config.maturities, &config.rates)?;
            let params = ns
                .params()
                .ok_or(CurveError::NotCalibrated { model: "Nelson-Siegel" })?;
            (
                CurveParams::NelsonSiegel(params),
                curve_grid(&ns, &query, config.forward_tenor)?,
                ns.spot_rates(&config.maturities)?,
                Some(fit),
            )
        }
        ModelKind::Dns => {
            return Err(AppError::new(2, "The dynamic model needs a rate panel; use `esg dns`."));
        }
    };

    info!(model = config.model.display_name(), pillars = config.maturities.len(), "curve fitted");

    Ok(StaticRun {
        model: config.model,
        maturities: config.maturities.clone(),
        rates: config.rates.clone(),
        fitted,
        params,
        grid,
        ns_fit,
    })
}

/// Train the dynamic model on a panel and build the scenario ensemble.
pub fn run_dns(config: &DnsRunConfig) -> Result<DnsRun, AppError> {
    let query = query_grid(config.horizon, config.points)?;
    let panel = load_panel(&config.panel_path, config.start, config.end)?;
    for e in &panel.row_errors {
        warn!(line = e.line, "skipped panel row: {}", e.message);
    }
    info!(
        rows_read = panel.rows_read,
        rows_used = panel.rows_used,
        first = %panel.panel.dates[0],
        last = %panel.panel.dates[panel.rows_used - 1],
        "panel loaded"
    );

    let maturities = panel.panel.maturities.as_slice().to_vec();
    let mut dns = DynamicNelsonSiegel::new(config.dt, &maturities)?;
    let options = TrainOptions {
        lr: config.lr,
        tol: config.tol,
        max_iter: config.max_iter,
        disp: config.disp,
        ..TrainOptions::default()
    };

    info!(tol = config.tol, lr = config.lr, "training dynamic Nelson-Siegel");
    let converged = match dns.train_with(&panel.panel.rates, &options) {
        Ok(report) => {
            info!(
                iterations = report.iterations,
                log_likelihood = report.log_likelihood,
                "training converged"
            );
            true
        }
        Err(err @ CurveError::NonConvergence { .. }) => {
            warn!("{err}; continuing with the last accepted parameters");
            false
        }
        Err(err) => return Err(err.into()),
    };

    let params = dns
        .params()
        .cloned()
        .ok_or(CurveError::NotCalibrated { model: "Dynamic Nelson-Siegel" })?;

    let to_decimal = config.unit.to_decimal_factor();
    let scenarios = dns.sample(config.horizon_years, config.num_scenarios, config.seed)? * to_decimal;
    debug!(scenarios = scenarios.nrows(), "scenarios sampled");

    let curves = build_scenario_curves(
        config.alpha,
        config.ltfr,
        &maturities,
        &scenarios,
        &query,
        config.forward_tenor,
    )?;

    let last_row: Vec<f64> = panel
        .panel
        .last_row()
        .ok_or_else(|| AppError::new(3, "Panel is empty."))?
        .iter()
        .map(|r| r * to_decimal)
        .collect();
    let mut base_curve = SmithWilsonCurve::new(config.alpha, config.ltfr)?;
    base_curve.fit(&maturities, &last_row)?;
    let base = curve_grid(&base_curve, &query, config.forward_tenor)?;

    let shock = dns.shock(config.horizon_years)?;

    Ok(DnsRun {
        panel,
        unit: config.unit,
        report: dns.report(),
        converged,
        params,
        scenarios,
        curves,
        base,
        shock,
    })
}

/// Generate a synthetic panel and write it to `config.out`.
pub fn run_synth(config: &SyntheticConfig) -> Result<RatePanel, AppError> {
    let panel = generate_panel(config)?;
    write_panel_csv(&config.out, &panel)?;
    info!(rows = panel.n_rows(), path = %config.out.display(), "synthetic panel written");
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const MATURITIES: [f64; 6] = [1.0, 3.0, 5.0, 10.0, 20.0, 30.0];
    const RATES: [f64; 6] = [0.016, 0.018, 0.020, 0.024, 0.027, 0.028];

    fn static_config(model: ModelKind) -> StaticRunConfig {
        StaticRunConfig {
            model,
            maturities: MATURITIES.to_vec(),
            rates: RATES.to_vec(),
            alpha: 0.1,
            ltfr: 0.042,
            horizon: 100.0,
            points: 1201,
            forward_tenor: 1.0,
            export_dir: None,
            export_curve: None,
        }
    }

    #[test]
    fn static_smith_wilson_run() {
        let run = run_static(&static_config(ModelKind::Sw)).unwrap();
        assert_eq!(run.grid.spot.len(), 1201);
        assert!((run.grid.tenor_years[12] - 1.0).abs() < 1e-12);
        for (fit, obs) in run.fitted.iter().zip(&RATES) {
            assert!((fit - obs).abs() < 1e-6);
        }
        assert!((run.grid.forward[1200] - 0.042).abs() < 1e-3);
        assert!(matches!(run.params, CurveParams::SmithWilson(_)));
    }

    #[test]
    fn static_nelson_siegel_run() {
        let mut cfg = static_config(ModelKind::Ns);
        cfg.forward_tenor = 1.0 / 12.0;
        let run = run_static(&cfg).unwrap();
        assert!(run.ns_fit.unwrap().rmse < 5e-4);
        assert!(run.grid.spot.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn static_run_rejects_dns_and_bad_grid() {
        assert_eq!(run_static(&static_config(ModelKind::Dns)).unwrap_err().exit_code(), 2);
        let mut cfg = static_config(ModelKind::Sw);
        cfg.points = 1;
        assert_eq!(run_static(&cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn synthetic_panel_drives_the_dynamic_workflow() {
        let dir = std::env::temp_dir().join(format!("esg-pipeline-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let panel_path = dir.join("panel.csv");

        let synth = SyntheticConfig {
            out: panel_path.clone(),
            rows: 120,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            maturities: MATURITIES.to_vec(),
            lambda: 1.8,
            factor_vol: [0.03, 0.02, 0.02],
            noise: 0.005,
        };
        run_synth(&synth).unwrap();

        let config = DnsRunConfig {
            panel_path: PathBuf::from(&panel_path),
            start: None,
            end: None,
            unit: RateUnit::Percent,
            dt: 1.0 / 250.0,
            lr: 5e-8,
            tol: 1e-6,
            max_iter: 5,
            disp: false,
            horizon_years: 1.0,
            num_scenarios: 16,
            seed: 20210103,
            alpha: 0.1,
            ltfr: 0.042,
            horizon: 100.0,
            points: 101,
            forward_tenor: 1.0,
            export_dir: None,
            export_curve: None,
        };
        let run = run_dns(&config).unwrap();

        assert_eq!(run.panel.rows_used, 120);
        assert_eq!(run.scenarios.shape(), (16, 6));
        assert_eq!(run.curves.spot.shape(), (16, 101));
        assert_eq!(run.base.spot.len(), 101);
        assert!(run.curves.forward.iter().all(|v| v.is_finite()));
        // Panel is in percent; the ensemble works in decimals.
        assert!(run.scenarios.iter().all(|v| v.abs() < 0.5));
        assert!(run.report.is_some());

        std::fs::remove_dir_all(dir).ok();
    }
}
