//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{DnsRun, StaticRun};
use crate::domain::{CurveFile, CurveGrid, CurveParams, RateUnit};
use crate::models::ShockSet;

/// Maturities shown in the curve tables (years).
const KEY_TENORS: [f64; 9] = [0.0, 1.0, 3.0, 5.0, 10.0, 20.0, 30.0, 50.0, 100.0];

/// Summary of a static Smith-Wilson / Nelson-Siegel run.
pub fn format_static_summary(run: &StaticRun) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== esg - {} curve ===\n", run.model.display_name()));
    out.push_str(&format_params(&run.params));
    if let Some(fit) = &run.ns_fit {
        out.push_str(&format!(
            "Fit: SSE={:.3e} RMSE={:.2}bp iterations={}\n",
            fit.sse,
            fit.rmse * 1e4,
            fit.iterations
        ));
    }

    out.push_str("\nPillars:\n");
    out.push_str(&format!("{:>8} {:>10} {:>10} {:>10}\n", "tenor", "observed", "fitted", "resid(bp)"));
    out.push_str(&format!("{:-<8} {:-<10} {:-<10} {:-<10}\n", "", "", "", ""));
    for ((t, obs), fit) in run.maturities.iter().zip(&run.rates).zip(&run.fitted) {
        out.push_str(&format!(
            "{:>8.2} {:>9.4}% {:>9.4}% {:>10.3}\n",
            t,
            obs * 100.0,
            fit * 100.0,
            (obs - fit) * 1e4
        ));
    }

    out.push('\n');
    out.push_str(&format_curve_table(&run.grid));
    out
}

/// Summary of a dynamic Nelson-Siegel run.
pub fn format_dns_summary(run: &DnsRun) -> String {
    let mut out = String::new();
    let panel = &run.panel.panel;

    out.push_str("=== esg - Dynamic Nelson-Siegel scenarios ===\n");
    if let (Some(first), Some(last)) = (panel.dates.first(), panel.dates.last()) {
        out.push_str(&format!(
            "Panel: {} rows used of {} read | {first} .. {last} | maturities {}\n",
            run.panel.rows_used,
            run.panel.rows_read,
            fmt_vec(panel.maturities.as_slice(), 2)
        ));
    }
    if !run.panel.row_errors.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", run.panel.row_errors.len()));
    }

    if let Some(report) = &run.report {
        out.push_str(&format!(
            "Training: {} after {} iterations | log-likelihood {:.3} -> {:.3} | lr {:.3e}\n",
            if run.converged { "converged" } else { "NOT converged" },
            report.iterations,
            report.initial_log_likelihood,
            report.log_likelihood,
            report.final_lr
        ));
    }
    out.push_str(&format_params(&CurveParams::DynamicNelsonSiegel(run.params.clone())));

    out.push_str(&format!(
        "\nScenarios: {} paths | spot range at {:.0}y [{:.4}%, {:.4}%]\n",
        run.curves.n_scenarios(),
        run.base.tenor_years.last().copied().unwrap_or_default(),
        column_min(&run.curves.spot) * 100.0,
        column_max(&run.curves.spot) * 100.0
    ));

    out.push_str("\nBase curve (last panel row):\n");
    out.push_str(&format_curve_table(&run.base));
    out.push('\n');
    out.push_str(&format_shock_table(&run.shock, panel.maturities.as_slice(), run.unit));
    out
}

/// Summary of a saved calibration file.
pub fn format_curve_file(curve: &CurveFile) -> String {
    let model = match curve.params {
        CurveParams::SmithWilson(_) => "Smith-Wilson",
        CurveParams::NelsonSiegel(_) => "Nelson-Siegel",
        CurveParams::DynamicNelsonSiegel(_) => "Dynamic Nelson-Siegel",
    };
    let mut out = format!("=== {} calibration ({}, {}) ===\n", model, curve.tool, curve.created);
    out.push_str(&format_params(&curve.params));
    out.push('\n');
    out.push_str(&format_curve_table(&curve.grid));
    out
}

/// Shock decomposition table, one row per maturity, in basis points.
pub fn format_shock_table(shock: &ShockSet, maturities: &[f64], unit: RateUnit) -> String {
    let bp = unit.to_decimal_factor() * 1e4;
    let mut out = String::new();
    out.push_str(&format!(
        "Shocks over {:.2}y at {:.1}% (bp):\n",
        shock.horizon,
        shock.confidence * 100.0
    ));
    out.push_str(&format!(
        "{:>8} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "tenor", "mean_rev", "level_up", "level_dn", "steepen", "flatten"
    ));
    out.push_str(&format!(
        "{:-<8} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10}\n",
        "", "", "", "", "", ""
    ));
    for (j, t) in maturities.iter().enumerate() {
        out.push_str(&format!(
            "{:>8.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}\n",
            t,
            shock.mean_reversion[j] * bp,
            shock.level_up[j] * bp,
            shock.level_down[j] * bp,
            shock.twist_steepen[j] * bp,
            shock.twist_flatten[j] * bp
        ));
    }
    out
}

/// Spot/forward values at the key tenors covered by `grid`.
pub fn format_curve_table(grid: &CurveGrid) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8} {:>10} {:>10}   (forward span {:.4}y)\n",
        "tenor", "spot", "forward", grid.forward_tenor
    ));
    out.push_str(&format!("{:-<8} {:-<10} {:-<10}\n", "", "", ""));
    for t in KEY_TENORS {
        let Some(i) = nearest_index(&grid.tenor_years, t) else {
            continue;
        };
        out.push_str(&format!(
            "{:>8.2} {:>9.4}% {:>9.4}%\n",
            grid.tenor_years[i],
            grid.spot[i] * 100.0,
            grid.forward[i] * 100.0
        ));
    }
    out
}

fn format_params(params: &CurveParams) -> String {
    match params {
        CurveParams::SmithWilson(p) => format!(
            "Parameters: alpha={:.4} ltfr={:.4}%\n- zeta: {}\n",
            p.alpha,
            p.ltfr * 100.0,
            fmt_vec(&p.coefficients, 6)
        ),
        CurveParams::NelsonSiegel(p) => format!(
            "Parameters: beta0={:.6} beta1={:.6} beta2={:.6} lambda={:.4}\n",
            p.beta0, p.beta1, p.beta2, p.lambda
        ),
        CurveParams::DynamicNelsonSiegel(p) => format!(
            "Parameters: lambda={:.4} dt={:.5}\n- theta: {}\n- kappa: {}\n- sigma: {}\n- obs_std: {}\n",
            p.lambda,
            p.dt,
            fmt_vec(&p.theta, 4),
            fmt_vec(&p.kappa, 4),
            fmt_vec(&p.sigma, 4),
            fmt_vec(&p.obs_std, 5)
        ),
    }
}

/// Index of the grid point closest to `t`, if `t` lies within the grid.
fn nearest_index(grid: &[f64], t: f64) -> Option<usize> {
    let (first, last) = (*grid.first()?, *grid.last()?);
    if t < first || t > last + 1e-9 {
        return None;
    }
    grid.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - t).abs().total_cmp(&(*b - t).abs()))
        .map(|(i, _)| i)
}

fn column_min(m: &nalgebra::DMatrix<f64>) -> f64 {
    let last = m.ncols().saturating_sub(1);
    m.column(last).min()
}

fn column_max(m: &nalgebra::DMatrix<f64>) -> f64 {
    let last = m.ncols().saturating_sub(1);
    m.column(last).max()
}

fn fmt_vec(v: &[f64], decimals: usize) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.decimals$}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::linspace;

    fn grid() -> CurveGrid {
        let t = linspace(0.0, 100.0, 1201);
        CurveGrid {
            spot: t.iter().map(|x| 0.02 + 0.0001 * x).collect(),
            forward: t.iter().map(|x| 0.025 + 0.0001 * x).collect(),
            tenor_years: t,
            forward_tenor: 1.0,
        }
    }

    #[test]
    fn curve_table_lists_key_tenors() {
        let table = format_curve_table(&grid());
        assert_eq!(table.lines().count(), 2 + KEY_TENORS.len());
        assert!(table.contains("  100.00"));
        assert!(table.contains("2.1000%"));
    }

    #[test]
    fn curve_table_skips_tenors_beyond_grid() {
        let mut g = grid();
        g.tenor_years.truncate(361);
        g.spot.truncate(361);
        g.forward.truncate(361);
        let table = format_curve_table(&g);
        assert!(!table.contains("50.00"));
        assert!(table.contains("30.00"));
    }

    #[test]
    fn shock_table_is_in_basis_points() {
        let shock = ShockSet {
            horizon: 1.0,
            confidence: 0.995,
            mean_reversion: vec![0.01, -0.02],
            level_up: vec![0.5, 0.5],
            level_down: vec![-0.5, -0.5],
            twist_steepen: vec![-0.1, 0.1],
            twist_flatten: vec![0.1, -0.1],
        };
        let table = format_shock_table(&shock, &[1.0, 30.0], RateUnit::Percent);
        // 0.5 percentage points = 50bp.
        assert!(table.contains("50.00"));
        assert!(table.contains("99.5%"));
        assert_eq!(table.lines().count(), 5);
    }

    #[test]
    fn curve_file_summary_names_the_model() {
        let curve = CurveFile {
            tool: "esg".to_string(),
            created: "2024-01-01T00:00:00".to_string(),
            params: CurveParams::NelsonSiegel(crate::models::NelsonSiegelParams {
                beta0: 0.03,
                beta1: -0.01,
                beta2: 0.0,
                lambda: 2.0,
            }),
            grid: grid(),
        };
        let text = format_curve_file(&curve);
        assert!(text.starts_with("=== Nelson-Siegel calibration"));
        assert!(text.contains("lambda=2.0000"));
    }

    #[test]
    fn nearest_index_respects_bounds() {
        let g = [0.0, 0.5, 1.0];
        assert_eq!(nearest_index(&g, 0.6), Some(1));
        assert_eq!(nearest_index(&g, 2.0), None);
        assert_eq!(nearest_index(&[], 1.0), None);
    }
}
