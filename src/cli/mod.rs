//! Command-line parsing for the `esg` yield-curve tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code: every subcommand's arguments are converted into a
//! plain config struct from `domain` before anything runs.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{DnsRunConfig, ModelKind, RateUnit, StaticRunConfig, SyntheticConfig};
use crate::error::AppError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "esg",
    version,
    about = "Risk-free yield curves: Smith-Wilson, Nelson-Siegel and Dynamic Nelson-Siegel scenarios"
)]
pub struct Cli {
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`); `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a Smith-Wilson curve through pillar rates and extrapolate to the LTFR.
    Sw(SwArgs),
    /// Fit a static Nelson-Siegel curve through pillar rates.
    Ns(NsArgs),
    /// Train a Dynamic Nelson-Siegel model on a rate panel and generate scenarios.
    Dns(DnsArgs),
    /// Write a seeded synthetic rate panel CSV.
    Synth(SynthArgs),
    /// Print a previously exported calibration JSON.
    Show(ShowArgs),
}

/// Pillar inputs shared by the static models.
#[derive(Debug, Args, Clone)]
pub struct PillarArgs {
    /// Observed spot rates in percent, one per maturity (e.g. 1.6,1.8,2.0,2.4,2.7,2.8).
    #[arg(long, value_delimiter = ',', required = true)]
    pub rates: Vec<f64>,

    /// Pillar maturities in years.
    #[arg(long, value_delimiter = ',', default_values_t = [1.0, 3.0, 5.0, 10.0, 20.0, 30.0])]
    pub maturities: Vec<f64>,
}

/// Query grid and output options shared by every fitting command.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Longest query maturity (years).
    #[arg(long, default_value_t = 100.0)]
    pub horizon: f64,

    /// Number of query points on `[0, horizon]`.
    #[arg(long, default_value_t = 1201)]
    pub points: usize,

    /// Write spot/forward CSVs (timestamped) into this directory.
    #[arg(long = "export-dir")]
    pub export_dir: Option<PathBuf>,

    /// Write the calibration (parameters + base grid) to JSON.
    #[arg(long = "export-curve")]
    pub export_curve: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SwArgs {
    #[command(flatten)]
    pub pillars: PillarArgs,

    /// Long-term forward rate in percent.
    #[arg(long, default_value_t = 4.2)]
    pub ltfr: f64,

    /// Convergence speed.
    #[arg(long, default_value_t = 0.1)]
    pub alpha: f64,

    /// Forward-rate span (years).
    #[arg(long, default_value_t = 1.0)]
    pub tenor: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct NsArgs {
    #[command(flatten)]
    pub pillars: PillarArgs,

    /// Forward-rate span (years).
    #[arg(long, default_value_t = 1.0 / 12.0)]
    pub tenor: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DnsArgs {
    /// Rate panel CSV (`date,<maturity>,...`).
    #[arg(long, value_name = "CSV")]
    pub panel: PathBuf,

    /// First date to use (inclusive, YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date to use (inclusive, YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Units of the panel values.
    #[arg(long, value_enum, default_value_t = RateUnit::Percent)]
    pub unit: RateUnit,

    /// Long-term forward rate in percent, for the Smith-Wilson ensemble.
    #[arg(long, default_value_t = 4.2)]
    pub ltfr: f64,

    /// Smith-Wilson convergence speed.
    #[arg(long, default_value_t = 0.1)]
    pub alpha: f64,

    /// Training tolerance on the log-likelihood improvement.
    #[arg(long, default_value_t = 1e-6)]
    pub tol: f64,

    /// Initial learning rate.
    #[arg(long, default_value_t = 5e-8)]
    pub lr: f64,

    /// Iteration cap for training.
    #[arg(long, default_value_t = 1000)]
    pub max_iter: usize,

    /// Time step between panel rows (years).
    #[arg(long, default_value_t = 1.0 / 250.0)]
    pub dt: f64,

    /// Scenario horizon (years).
    #[arg(long, default_value_t = 1.0)]
    pub time: f64,

    /// Number of scenarios.
    #[arg(long, default_value_t = 200)]
    pub num: usize,

    /// Scenario seed.
    #[arg(long, default_value_t = 20210103)]
    pub seed: u32,

    /// Report training progress every iteration.
    #[arg(long)]
    pub disp: bool,

    /// Forward-rate span (years).
    #[arg(long, default_value_t = 1.0)]
    pub tenor: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of business-day rows.
    #[arg(long, default_value_t = 250)]
    pub rows: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First date (YYYY-MM-DD).
    #[arg(long, default_value = "2020-01-02")]
    pub start: NaiveDate,

    /// Maturities in years.
    #[arg(long, value_delimiter = ',', default_values_t = [1.0, 3.0, 5.0, 10.0, 20.0, 30.0])]
    pub maturities: Vec<f64>,

    /// Loading decay scale (years).
    #[arg(long, default_value_t = 1.8)]
    pub lambda: f64,

    /// Daily factor volatilities in percent (level,slope,curvature).
    #[arg(long, value_delimiter = ',', default_values_t = [0.03, 0.02, 0.02])]
    pub factor_vol: Vec<f64>,

    /// Observation noise in percent.
    #[arg(long, default_value_t = 0.005)]
    pub noise: f64,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Calibration JSON produced with `--export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,
}

impl SwArgs {
    pub fn to_config(&self) -> StaticRunConfig {
        StaticRunConfig {
            model: ModelKind::Sw,
            maturities: self.pillars.maturities.clone(),
            rates: percent_to_decimal(&self.pillars.rates),
            alpha: self.alpha,
            ltfr: self.ltfr / 100.0,
            horizon: self.output.horizon,
            points: self.output.points,
            forward_tenor: self.tenor,
            export_dir: self.output.export_dir.clone(),
            export_curve: self.output.export_curve.clone(),
        }
    }
}

impl NsArgs {
    pub fn to_config(&self) -> StaticRunConfig {
        StaticRunConfig {
            model: ModelKind::Ns,
            maturities: self.pillars.maturities.clone(),
            rates: percent_to_decimal(&self.pillars.rates),
            alpha: 0.1,
            ltfr: 0.0,
            horizon: self.output.horizon,
            points: self.output.points,
            forward_tenor: self.tenor,
            export_dir: self.output.export_dir.clone(),
            export_curve: self.output.export_curve.clone(),
        }
    }
}

impl DnsArgs {
    pub fn to_config(&self) -> DnsRunConfig {
        DnsRunConfig {
            panel_path: self.panel.clone(),
            start: self.start,
            end: self.end,
            unit: self.unit,
            dt: self.dt,
            lr: self.lr,
            tol: self.tol,
            max_iter: self.max_iter,
            disp: self.disp,
            horizon_years: self.time,
            num_scenarios: self.num,
            seed: self.seed,
            alpha: self.alpha,
            ltfr: self.ltfr / 100.0,
            horizon: self.output.horizon,
            points: self.output.points,
            forward_tenor: self.tenor,
            export_dir: self.output.export_dir.clone(),
            export_curve: self.output.export_curve.clone(),
        }
    }
}

impl SynthArgs {
    pub fn to_config(&self) -> Result<SyntheticConfig, AppError> {
        let [level, slope, curvature] = self.factor_vol[..] else {
            return Err(AppError::new(
                2,
                format!("--factor-vol needs 3 values, got {}.", self.factor_vol.len()),
            ));
        };
        Ok(SyntheticConfig {
            out: self.out.clone(),
            rows: self.rows,
            seed: self.seed,
            start: self.start,
            maturities: self.maturities.clone(),
            lambda: self.lambda,
            factor_vol: [level, slope, curvature],
            noise: self.noise,
        })
    }
}

fn percent_to_decimal(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v / 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sw_args_convert_percent_inputs() {
        let cli = Cli::parse_from(["esg", "sw", "--rates", "1.6,1.8,2.0,2.4,2.7,2.8", "--ltfr", "4.2"]);
        let Command::Sw(args) = cli.command else {
            panic!("expected sw");
        };
        let cfg = args.to_config();
        assert_eq!(cfg.maturities, vec![1.0, 3.0, 5.0, 10.0, 20.0, 30.0]);
        assert!((cfg.rates[0] - 0.016).abs() < 1e-15);
        assert!((cfg.ltfr - 0.042).abs() < 1e-15);
        assert_eq!(cfg.points, 1201);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn dns_defaults_follow_the_reference_workflow() {
        let cli = Cli::parse_from([
            "esg",
            "dns",
            "--panel",
            "rates.csv",
            "--start",
            "2020-01-01",
            "--log-level",
            "debug",
        ]);
        let Command::Dns(args) = cli.command else {
            panic!("expected dns");
        };
        let cfg = args.to_config();
        assert_eq!(cfg.seed, 20210103);
        assert_eq!(cfg.num_scenarios, 200);
        assert_eq!(cfg.lr, 5e-8);
        assert_eq!(cfg.unit, RateUnit::Percent);
        assert_eq!(cfg.start, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert!((cfg.dt - 0.004).abs() < 1e-15);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn synth_factor_vols_parse() {
        let cli = Cli::parse_from(["esg", "synth", "--out", "p.csv", "--factor-vol", "0.1,0.2,0.3"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.to_config().unwrap().factor_vol, [0.1, 0.2, 0.3]);

        let cli = Cli::parse_from(["esg", "synth", "--out", "p.csv", "--factor-vol", "0.1,0.2"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.to_config().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
