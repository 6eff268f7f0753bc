use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::CurveError;
use crate::models::{DnsParams, NelsonSiegelParams, SmithWilsonParams};

/// Non-empty, strictly increasing, positive maturities (years).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct MaturityGrid(Vec<f64>);

impl MaturityGrid {
    pub fn new(maturities: Vec<f64>) -> Result<Self, CurveError> {
        if maturities.is_empty() {
            return Err(CurveError::input_shape("maturity vector is empty"));
        }
        if let Some(bad) = maturities.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(CurveError::input_shape(format!(
                "maturities must be finite and positive, got {bad}"
            )));
        }
        if let Some(w) = maturities.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CurveError::input_shape(format!(
                "maturities must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self(maturities))
    }

    /// True if any maturity value appears more than once (in any order).
    pub fn has_duplicates(maturities: &[f64]) -> bool {
        let mut sorted = maturities.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted.windows(2).any(|w| w[0] == w[1])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for MaturityGrid {
    type Error = CurveError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        MaturityGrid::new(value)
    }
}

impl From<MaturityGrid> for Vec<f64> {
    fn from(value: MaturityGrid) -> Self {
        value.0
    }
}

/// Validate a (maturity, rate) pillar set.
pub fn check_pillars(maturities: &[f64], rates: &[f64]) -> Result<MaturityGrid, CurveError> {
    if maturities.len() != rates.len() {
        return Err(CurveError::input_shape(format!(
            "{} maturities but {} rates",
            maturities.len(),
            rates.len()
        )));
    }
    if let Some(bad) = rates.iter().find(|r| !r.is_finite()) {
        return Err(CurveError::input_shape(format!("non-finite rate {bad}")));
    }
    MaturityGrid::new(maturities.to_vec())
}

/// Historical rate panel: rows = dates ascending, columns = maturities.
#[derive(Debug, Clone)]
pub struct RatePanel {
    pub dates: Vec<NaiveDate>,
    pub maturities: MaturityGrid,
    /// `dates.len() × maturities.len()`, in the panel's native units.
    pub rates: DMatrix<f64>,
}

impl RatePanel {
    pub fn new(dates: Vec<NaiveDate>, maturities: MaturityGrid, rates: DMatrix<f64>) -> Result<Self, CurveError> {
        if rates.nrows() != dates.len() || rates.ncols() != maturities.len() {
            return Err(CurveError::input_shape(format!(
                "panel is {}x{} but has {} dates and {} maturities",
                rates.nrows(),
                rates.ncols(),
                dates.len(),
                maturities.len()
            )));
        }
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CurveError::input_shape("panel dates must be strictly ascending"));
        }
        Ok(Self {
            dates,
            maturities,
            rates,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rates.nrows()
    }

    /// Most recent observation row.
    pub fn last_row(&self) -> Option<Vec<f64>> {
        let n = self.rates.nrows();
        (n > 0).then(|| self.rates.row(n - 1).iter().copied().collect())
    }

    /// Keep rows with `start <= date <= end` (either bound optional).
    pub fn filter_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> RatePanel {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
            .map(|(i, _)| i)
            .collect();
        let rates = DMatrix::from_fn(keep.len(), self.rates.ncols(), |i, j| self.rates[(keep[i], j)]);
        RatePanel {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            maturities: self.maturities.clone(),
            rates,
        }
    }
}

/// Curve model selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Sw,
    Ns,
    Dns,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Sw => "Smith-Wilson",
            ModelKind::Ns => "Nelson-Siegel",
            ModelKind::Dns => "Dynamic Nelson-Siegel",
        }
    }
}

/// Units of rates supplied on the command line or in a panel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    /// `2.5` means 2.5%.
    Percent,
    /// `0.025` means 2.5%.
    Decimal,
}

impl RateUnit {
    /// Multiplier converting this unit to decimals.
    pub fn to_decimal_factor(self) -> f64 {
        match self {
            RateUnit::Percent => 0.01,
            RateUnit::Decimal => 1.0,
        }
    }
}

/// Configuration of a one-shot Smith–Wilson or Nelson–Siegel run.
#[derive(Debug, Clone)]
pub struct StaticRunConfig {
    pub model: ModelKind,
    pub maturities: Vec<f64>,
    /// Pillar rates in decimals.
    pub rates: Vec<f64>,
    pub alpha: f64,
    /// Ultimate forward rate in decimals (Smith–Wilson only).
    pub ltfr: f64,
    pub horizon: f64,
    pub points: usize,
    /// Span `h` of the forward-rate finite difference.
    pub forward_tenor: f64,
    pub export_dir: Option<PathBuf>,
    pub export_curve: Option<PathBuf>,
}

/// Configuration of a dynamic Nelson–Siegel calibration + scenario run.
#[derive(Debug, Clone)]
pub struct DnsRunConfig {
    pub panel_path: PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub unit: RateUnit,
    pub dt: f64,
    pub lr: f64,
    pub tol: f64,
    pub max_iter: usize,
    pub disp: bool,
    pub horizon_years: f64,
    pub num_scenarios: usize,
    pub seed: u32,
    pub alpha: f64,
    /// Ultimate forward rate in decimals.
    pub ltfr: f64,
    pub horizon: f64,
    pub points: usize,
    pub forward_tenor: f64,
    pub export_dir: Option<PathBuf>,
    pub export_curve: Option<PathBuf>,
}

/// Configuration of the synthetic panel generator.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub out: PathBuf,
    pub rows: usize,
    pub seed: u64,
    pub start: NaiveDate,
    pub maturities: Vec<f64>,
    pub lambda: f64,
    /// Daily factor volatilities (level, slope, curvature), in percent.
    pub factor_vol: [f64; 3],
    /// Observation noise standard deviation, in percent.
    pub noise: f64,
}

/// Calibrated parameters of any model, as stored in curve JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CurveParams {
    SmithWilson(SmithWilsonParams),
    NelsonSiegel(NelsonSiegelParams),
    DynamicNelsonSiegel(DnsParams),
}

/// Spot/forward curves evaluated on a query grid (decimals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub tenor_years: Vec<f64>,
    pub spot: Vec<f64>,
    pub forward: Vec<f64>,
    pub forward_tenor: f64,
}

/// A saved calibration file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub created: String,
    pub params: CurveParams,
    /// Base curve; for the dynamic model this is the Smith–Wilson fit of the last panel row.
    pub grid: CurveGrid,
}
