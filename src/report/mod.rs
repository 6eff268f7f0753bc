//! Terminal reports for static fits, DNS runs and shock tables.

pub mod format;

pub use format::*;
