//! Server error taxonomy.

use crate::ieee_c37_118::common::ParseError;
use thiserror::Error;

/// Errors surfaced by [`crate::pmu::Pmu`] operations.
#[derive(Debug, Error)]
pub enum PmuError {
    /// An operation needed a configuration before one was installed.
    #[error("device is not configured; install a CFG-2 frame first")]
    NotConfigured,

    /// The supplied configuration frame was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Measurement values did not match the configured channel layout.
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
