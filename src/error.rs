//! Error taxonomy for session commands.
//!
//! None of these are fatal: the controller logs every rejected command and
//! leaves the session untouched.

use crate::model::{ParameterField, Severity};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be a positive number (got {value})")]
    NonPositive { field: ParameterField, value: f64 },

    #[error("max duration {max:.2} ms is below min duration {min:.2} ms")]
    RangeConflict { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("file name is empty")]
    EmptyFileName,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Error: no data source")]
    NoDataSource,

    #[error("Data source cannot be changed while processing is running")]
    SourceLockedWhileProcessing,

    #[error("Invalid parameters: {0}")]
    Validation(#[from] ValidationError),

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),
}

impl SessionError {
    /// Severity of the log entry recorded when a command is rejected.
    pub fn severity(&self) -> Severity {
        match self {
            SessionError::NoDataSource | SessionError::Acquisition(_) => Severity::Error,
            SessionError::SourceLockedWhileProcessing | SessionError::Validation(_) => {
                Severity::Warning
            }
        }
    }
}
