//! `esg-curves` library crate.
//!
//! The binary (`esg`) is a thin wrapper around this library so that:
//!
//! - the curve models are testable without spawning processes
//! - the numerical core (`math`, `models`, `fit`) can be embedded elsewhere
//!   without the CLI, file formats or logging setup

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
