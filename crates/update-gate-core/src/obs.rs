//! Structured observability hooks for admission runs.
//!
//! This module provides:
//! - A submission-scoped tracing span via `AdmissionSpan`
//! - Emission functions for key events: admission start and finish, each
//!   check finishing, and ACL denials
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::{info, warn};

/// Submission-scoped span plus the id it is tagged with.
///
/// The pipeline awaits external services while the span is active, so the
/// span is attached with `Instrument` rather than entered as a guard.
///
/// ```ignore
/// let admission = AdmissionSpan::new("new");
/// run_checks().instrument(admission.span()).await;
/// ```
pub struct AdmissionSpan {
    id: String,
    span: tracing::Span,
}

impl AdmissionSpan {
    /// Create a span tagged with a fresh admission id.
    pub fn new(mode: &str) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("update_gate.admission", admission_id = %id, mode = %mode);
        Self { id, span }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }
}

pub fn emit_admission_started(admission_id: &str, builds: usize, user: Option<&str>) {
    info!(
        event = "admission.started",
        admission_id = %admission_id,
        builds = builds,
        user = user.unwrap_or("<anonymous>"),
    );
}

/// Emit event: one check finished, with the number of errors it added.
pub fn emit_check_finished(admission_id: &str, check: &str, new_errors: usize, aborted: bool) {
    info!(
        event = "check.finished",
        admission_id = %admission_id,
        check = %check,
        new_errors = new_errors,
        aborted = aborted,
    );
}

pub fn emit_admission_finished(
    admission_id: &str,
    duration_ms: u64,
    errors: usize,
    admitted: bool,
) {
    info!(
        event = "admission.finished",
        admission_id = %admission_id,
        duration_ms = duration_ms,
        errors = errors,
        admitted = admitted,
    );
}

/// Emit event: a user was refused commit access (warning level).
pub fn emit_acl_denied(user: &str, package: &str, branch: &str) {
    warn!(event = "acl.denied", user = %user, package = %package, branch = %branch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_span_ids_are_unique() {
        let first = AdmissionSpan::new("new");
        let second = AdmissionSpan::new("edit");
        assert_ne!(first.id(), second.id());
        assert_eq!(first.id().len(), 36);
    }
}
