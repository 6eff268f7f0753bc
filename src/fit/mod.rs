//! Fitting helpers shared by the models and the pipeline.
//!
//! - query grids and the deterministic `λ` profile search (parallel)
//! - the scenario ensemble: one Smith–Wilson fit per sampled scenario (parallel)

pub mod ensemble;
pub mod grid;

pub use ensemble::*;
pub use grid::*;
