//! Shared value types: maturity grids, rate panels, run configurations and the
//! calibration file schema.

pub mod types;

pub use types::*;
