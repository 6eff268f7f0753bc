//! Error types.
//!
//! Two layers:
//!
//! - [`CurveError`]: typed failures raised by the numerical core (fitting,
//!   calibration, evaluation). Variants carry enough context for a caller to
//!   retry with adjusted inputs.
//! - [`AppError`]: the application-level error returned by the `esg` binary,
//!   carrying the process exit code.

use thiserror::Error;

/// Failures raised by curve fitting, calibration and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    /// Malformed inputs: empty vectors, mismatched lengths, non-increasing maturities.
    #[error("invalid input shape: {reason}")]
    InputShape { reason: String },

    /// The Wilson kernel matrix could not be inverted for this maturity grid.
    #[error("singular Smith-Wilson system for maturities {maturities:?}")]
    SingularFit { maturities: Vec<f64> },

    /// An iterative optimiser ran out of iterations before reaching tolerance.
    #[error(
        "{model} did not converge after {iterations} iterations \
         (tolerance {tolerance:e}, last change {last_change:e})"
    )]
    NonConvergence {
        model: &'static str,
        iterations: usize,
        tolerance: f64,
        last_change: f64,
    },

    /// Not enough observations to identify the model.
    #[error("insufficient data for {model}: got {rows}, need at least {required}")]
    DataInsufficiency {
        model: &'static str,
        rows: usize,
        required: usize,
    },

    /// Query point outside the curve's domain (negative maturity, yield at t = 0).
    #[error("maturity {t} is outside the curve domain")]
    OutOfDomain { t: f64 },

    /// A scalar argument violates its contract (non-positive alpha, tenor, ...).
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Evaluation or sampling requested before a successful fit/train.
    #[error("{model} has not been calibrated")]
    NotCalibrated { model: &'static str },

    /// Linear algebra breakdown inside a calibration step.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl CurveError {
    pub fn input_shape(reason: impl Into<String>) -> Self {
        CurveError::InputShape {
            reason: reason.into(),
        }
    }

    /// Exit code used when this error terminates the `esg` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            CurveError::InputShape { .. }
            | CurveError::OutOfDomain { .. }
            | CurveError::InvalidParameter { .. } => 2,
            CurveError::DataInsufficiency { .. } => 3,
            CurveError::SingularFit { .. }
            | CurveError::NonConvergence { .. }
            | CurveError::NotCalibrated { .. }
            | CurveError::Numerical(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<CurveError> for AppError {
    fn from(err: CurveError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
