//! Pipeline failure classification
//!
//! Everything below the Job boundary is caught and converted into a terminal
//! failed status with a structured detail; no raw error crosses into the
//! client-facing status surface.

use std::time::Duration;
use thiserror::Error;

use planstore::StoreError;

use crate::config::SnapshotError;
use crate::domain::{FailureDetail, FailureKind};
use crate::export::ExportError;
use crate::gateway::GatewayError;
use crate::normalize::NormalizeError;

/// Anything that can take a pipeline down
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Job exceeded its total wait of {0:?}")]
    Timeout(Duration),
}

impl From<SnapshotError> for PipelineError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Store(e) => PipelineError::Storage(e),
            SnapshotError::KeyMissing(_) => PipelineError::Gateway(GatewayError::Auth(err.to_string())),
        }
    }
}

impl PipelineError {
    /// The structured payload recorded on failed jobs and sub-results
    pub fn failure_detail(&self) -> FailureDetail {
        let (kind, retryable) = match self {
            PipelineError::Gateway(e) if e.is_retryable() => (FailureKind::TransientProvider, true),
            PipelineError::Gateway(_) => (FailureKind::PermanentProvider, false),
            PipelineError::Normalize(_) => (FailureKind::Normalization, false),
            PipelineError::Storage(_) => (FailureKind::Storage, false),
            PipelineError::Export(_) => (FailureKind::Export, false),
            PipelineError::Timeout(_) => (FailureKind::Timeout, false),
        };
        FailureDetail {
            kind,
            message: self.to_string(),
            retryable,
        }
    }

    /// Storage faults are orchestration-level: they fail a whole batch, not
    /// just the member that hit them.
    pub fn is_storage(&self) -> bool {
        matches!(self, PipelineError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_classification_follows_retryability() {
        let transient = PipelineError::Gateway(GatewayError::Timeout(Duration::from_secs(1)));
        let detail = transient.failure_detail();
        assert_eq!(detail.kind, FailureKind::TransientProvider);
        assert!(detail.retryable);

        let permanent = PipelineError::Gateway(GatewayError::Auth("denied".to_string()));
        let detail = permanent.failure_detail();
        assert_eq!(detail.kind, FailureKind::PermanentProvider);
        assert!(!detail.retryable);
    }

    #[test]
    fn test_normalization_and_timeout_kinds() {
        assert_eq!(
            PipelineError::Normalize(NormalizeError::NoEntries).failure_detail().kind,
            FailureKind::Normalization
        );
        assert_eq!(
            PipelineError::Timeout(Duration::from_secs(600)).failure_detail().kind,
            FailureKind::Timeout
        );
    }

    #[test]
    fn test_storage_detection() {
        let err = PipelineError::Storage(StoreError::NotFound("plan x".to_string()));
        assert!(err.is_storage());
        assert_eq!(err.failure_detail().kind, FailureKind::Storage);
        assert!(!PipelineError::Normalize(NormalizeError::NoRooms).is_storage());
    }

    #[test]
    fn test_snapshot_key_missing_maps_to_auth() {
        let err: PipelineError = SnapshotError::KeyMissing("GEMINI_API_KEY".to_string()).into();
        assert_eq!(err.failure_detail().kind, FailureKind::PermanentProvider);
    }
}
