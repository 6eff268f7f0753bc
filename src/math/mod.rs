//! Numerical utilities shared by all curve models.
//!
//! - `rates`: yield/discount conversions and the forward-rate policy
//! - `basis`: Nelson–Siegel loadings
//! - `ols`: least squares on the loadings
//! - `simplex`: Nelder–Mead minimiser
//! - `rng`: seeded Gaussian stream for scenarios

pub mod basis;
pub mod ols;
pub mod rates;
pub mod rng;
pub mod simplex;

pub use basis::*;
pub use ols::*;
pub use rates::*;
