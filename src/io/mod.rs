//! Input/output helpers.
//!
//! - rate panel CSV ingest + validation (`panel`)
//! - curve and scenario CSV exports (`export`)
//! - calibration JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod panel;

pub use curve::*;
pub use export::*;
pub use panel::*;
