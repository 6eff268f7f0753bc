//! Export curves and scenario ensembles to CSV.
//!
//! Files are plain numbers without headers so they load directly into
//! spreadsheets or array libraries:
//!
//! - `spot_<ts>.csv`, `forward_<ts>.csv`: one value per line (query grid order)
//! - `scenario_spot_<ts>.csv`, `scenario_forward_<ts>.csv`: one scenario per line
//!
//! `<ts>` is the local time formatted `%Y%m%d%H%M%S`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use nalgebra::DMatrix;

use crate::domain::CurveGrid;
use crate::error::AppError;
use crate::fit::ScenarioCurves;

/// Timestamp used in export file names.
pub fn export_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Write the base spot and forward curves; returns the paths written.
pub fn export_curve_grid(dir: &Path, stamp: &str, grid: &CurveGrid) -> Result<Vec<PathBuf>, AppError> {
    ensure_dir(dir)?;
    let spot = dir.join(format!("spot_{stamp}.csv"));
    let forward = dir.join(format!("forward_{stamp}.csv"));
    write_column_csv(&spot, &grid.spot)?;
    write_column_csv(&forward, &grid.forward)?;
    Ok(vec![spot, forward])
}

/// Write the scenario ensemble; returns the paths written.
pub fn export_scenarios(dir: &Path, stamp: &str, curves: &ScenarioCurves) -> Result<Vec<PathBuf>, AppError> {
    ensure_dir(dir)?;
    let spot = dir.join(format!("scenario_spot_{stamp}.csv"));
    let forward = dir.join(format!("scenario_forward_{stamp}.csv"));
    write_matrix_csv(&spot, &curves.spot)?;
    write_matrix_csv(&forward, &curves.forward)?;
    Ok(vec![spot, forward])
}

fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create export directory '{}': {e}", dir.display())))
}

fn writer(path: &Path) -> Result<csv::Writer<fs::File>, AppError> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn write_column_csv(path: &Path, values: &[f64]) -> Result<(), AppError> {
    let mut w = writer(path)?;
    for v in values {
        w.write_record([v.to_string()])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

fn write_matrix_csv(path: &Path, values: &DMatrix<f64>) -> Result<(), AppError> {
    let mut w = writer(path)?;
    for row in values.row_iter() {
        w.write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("esg-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn stamp_format() {
        let t = Local.with_ymd_and_hms(2021, 1, 3, 9, 5, 7).unwrap();
        assert_eq!(export_stamp(t), "20210103090507");
    }

    #[test]
    fn curve_grid_export_is_one_value_per_line() {
        let dir = scratch("grid");
        let grid = CurveGrid {
            tenor_years: vec![0.0, 1.0, 2.0],
            spot: vec![0.01, 0.015, 0.02],
            forward: vec![0.02, 0.025, 0.03],
            forward_tenor: 1.0,
        };
        let paths = export_curve_grid(&dir, "20240101000000", &grid).unwrap();
        assert!(paths[0].ends_with("spot_20240101000000.csv"));
        let body = fs::read_to_string(&paths[0]).unwrap();
        let values: Vec<f64> = body.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(values, grid.spot);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn scenario_export_is_one_row_per_scenario() {
        let dir = scratch("scen");
        let curves = ScenarioCurves {
            spot: DMatrix::from_row_slice(2, 3, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]),
            forward: DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        };
        let paths = export_scenarios(&dir, "x", &curves).unwrap();
        let body = fs::read_to_string(&paths[1]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines, vec!["1,2,3", "4,5,6"]);
        fs::remove_dir_all(dir).ok();
    }
}
