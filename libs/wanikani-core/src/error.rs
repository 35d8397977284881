//! Error types for wanikani-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating upstream or cached values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("SRS stage out of range: {0}")]
    InvalidSrsStage(i64),

    #[error("unknown subject kind: {0}")]
    UnknownSubjectKind(String),
}
