//! Error taxonomy for admission.
//!
//! Validation problems are *recorded* on the [`ValidationContext`] as
//! field-scoped errors tagged with an [`ErrorKind`]. Only infrastructure
//! failures (an external service or the store itself failing) surface as
//! an [`AdmissionError`].
//!
//! [`ValidationContext`]: crate::context::ValidationContext

use serde::{Deserialize, Serialize};
use update_gate_services::ServiceError;
use update_gate_state::StoreError;

/// Category of a recorded validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FormatError,
    NotFound,
    OwnershipConflict,
    PermissionDenied,
    ReleaseInferenceError,
    TagMismatch,
    VersionRegression,
    DuplicateBuild,
    AmbiguousPackageBuilds,
    InvalidEnumValue,
    ExpirationOutOfRange,
    ChallengeFailed,
    InvalidReference,
}

/// Failures that abort the pipeline instead of rejecting the submission.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// Tag, ACL, challenge or catalog service failed; retryable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(#[from] ServiceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AdmissionError {
    /// Whether the caller should retry (5xx-equivalent) rather than report
    /// a configuration bug.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdmissionError::ServiceUnavailable(_) | AdmissionError::Store(_)
        )
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
