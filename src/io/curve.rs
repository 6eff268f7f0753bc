//! Read/write calibration JSON files.
//!
//! A curve file carries the calibrated parameters of one model plus its base
//! spot/forward grid, so a later run (or another tool) can reuse the fit
//! without re-reading market data. The schema is `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::Local;

use crate::domain::{CurveFile, CurveGrid, CurveParams};
use crate::error::AppError;

/// Assemble a curve file stamped with the current local time.
pub fn curve_file(params: CurveParams, grid: CurveGrid) -> CurveFile {
    CurveFile {
        tool: "esg".to_string(),
        created: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        params,
        grid,
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::models::{NelsonSiegelCurve, NelsonSiegelParams, SmithWilsonCurve, YieldCurve};

    #[test]
    fn smith_wilson_file_rebuilds_the_curve() {
        let mut sw = SmithWilsonCurve::new(0.1, 0.042).unwrap();
        sw.fit(&[1.0, 5.0, 10.0], &[0.016, 0.02, 0.024]).unwrap();
        let grid = CurveGrid {
            tenor_years: vec![1.0, 50.0],
            spot: sw.spot_rates(&[1.0, 50.0]).unwrap(),
            forward: sw.forward_rates(&[1.0, 50.0], 1.0).unwrap(),
            forward_tenor: 1.0,
        };
        let path = std::env::temp_dir().join(format!("esg-curve-{}-sw.json", std::process::id()));
        write_curve_json(&path, &curve_file(CurveParams::SmithWilson(sw.params().unwrap()), grid)).unwrap();

        let back = read_curve_json(&path).unwrap();
        assert_eq!(back.tool, "esg");
        let CurveParams::SmithWilson(p) = back.params else {
            panic!("expected Smith-Wilson parameters");
        };
        let orig = sw.params().unwrap();
        assert_eq!(p.maturities, orig.maturities);
        for (a, b) in p.coefficients.iter().zip(&orig.coefficients) {
            assert_relative_eq!(*a, *b, max_relative = 1e-14);
        }
        let rebuilt = SmithWilsonCurve::new(p.alpha, p.ltfr).and_then(|mut c| {
            c.fit(&p.maturities, &[0.016, 0.02, 0.024])?;
            Ok(c)
        });
        assert_relative_eq!(
            rebuilt.unwrap().spot_rate(50.0).unwrap(),
            back.grid.spot[1],
            max_relative = 1e-12
        );
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn params_are_tagged_by_model() {
        let params = NelsonSiegelParams {
            beta0: 0.03,
            beta1: -0.015,
            beta2: 0.005,
            lambda: 1.8,
        };
        let ns = NelsonSiegelCurve::new_with_params(params).unwrap();
        let grid = CurveGrid {
            tenor_years: vec![2.0],
            spot: vec![ns.spot_rate(2.0).unwrap()],
            forward: vec![ns.forward_rate(2.0, 1.0 / 12.0).unwrap()],
            forward_tenor: 1.0 / 12.0,
        };
        let json = serde_json::to_string(&curve_file(CurveParams::NelsonSiegel(params), grid)).unwrap();
        assert!(json.contains("\"model\":\"nelson_siegel\""));
    }

    #[test]
    fn invalid_json_is_exit_code_2() {
        let path = std::env::temp_dir().join(format!("esg-curve-{}-bad.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(read_curve_json(&path).unwrap_err().exit_code(), 2);
        std::fs::remove_file(path).ok();
    }
}
