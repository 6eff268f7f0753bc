//! Top-level application orchestration.
//!
//! `src/main.rs` only parses arguments and installs logging; this module is
//! the "real main" that:
//! - runs the selected workflow (see [`pipeline`])
//! - prints reports
//! - writes optional exports

use chrono::Local;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::domain::{CurveGrid, CurveParams};
use crate::error::AppError;
use crate::io::{curve_file, export_curve_grid, export_scenarios, export_stamp, read_curve_json, write_curve_json};

pub mod pipeline;

/// Entry point for the `esg` binary.
pub fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Sw(args) => handle_static(args.to_config()),
        Command::Ns(args) => handle_static(args.to_config()),
        Command::Dns(args) => handle_dns(args.to_config()),
        Command::Synth(args) => {
            let config = args.to_config()?;
            let panel = pipeline::run_synth(&config)?;
            println!("Wrote {} rows to {}", panel.n_rows(), config.out.display());
            Ok(())
        }
        Command::Show(args) => {
            let curve = read_curve_json(&args.curve)?;
            println!("{}", crate::report::format_curve_file(&curve));
            Ok(())
        }
    }
}

fn handle_static(config: crate::domain::StaticRunConfig) -> Result<(), AppError> {
    let run = pipeline::run_static(&config)?;
    println!("{}", crate::report::format_static_summary(&run));

    let stamp = export_stamp(Local::now());
    if let Some(dir) = &config.export_dir {
        for path in export_curve_grid(dir, &stamp, &run.grid)? {
            info!(path = %path.display(), "saved");
        }
    }
    if let Some(path) = &config.export_curve {
        save_curve(path, run.params, run.grid)?;
    }
    Ok(())
}

fn handle_dns(config: crate::domain::DnsRunConfig) -> Result<(), AppError> {
    let run = pipeline::run_dns(&config)?;
    println!("{}", crate::report::format_dns_summary(&run));

    let stamp = export_stamp(Local::now());
    if let Some(dir) = &config.export_dir {
        let mut written = export_curve_grid(dir, &stamp, &run.base)?;
        written.extend(export_scenarios(dir, &stamp, &run.curves)?);
        for path in written {
            info!(path = %path.display(), "saved");
        }
    }
    if let Some(path) = &config.export_curve {
        save_curve(path, CurveParams::DynamicNelsonSiegel(run.params), run.base)?;
    }
    Ok(())
}

fn save_curve(path: &std::path::Path, params: CurveParams, grid: CurveGrid) -> Result<(), AppError> {
    write_curve_json(path, &curve_file(params, grid))?;
    info!(path = %path.display(), "calibration saved");
    Ok(())
}
