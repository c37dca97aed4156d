//! # Error Handling
//!
//! Failures that end a reconciliation attempt. None of them abort the operator:
//! each one is turned into a blocked unit status carrying [`ReconcileError::reason`].

use thiserror::Error;

use crate::engine_config::ReadinessFailure;
use crate::models::status::CONTAINER_NOT_READY;
use crate::truststore::BuildFailure;
use crate::workload::WorkloadError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Readiness(#[from] ReadinessFailure),
    #[error("container not ready")]
    ContainerNotReady,
    #[error(transparent)]
    Build(#[from] BuildFailure),
    #[error("failed to render engine config: {0}")]
    Render(#[from] serde_json::Error),
    #[error(transparent)]
    Workload(#[from] WorkloadError),
}

impl ReconcileError {
    /// Short operator-facing reason shown in the unit status.
    pub fn reason(&self) -> String {
        match self {
            ReconcileError::Readiness(failure) => failure.reason(),
            ReconcileError::ContainerNotReady => CONTAINER_NOT_READY.to_string(),
            ReconcileError::Build(failure) => failure.reason(),
            ReconcileError::Render(_) => "serialize error".to_string(),
            ReconcileError::Workload(err) => err.to_string(),
        }
    }

    /// Metric label for the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Readiness(ReadinessFailure::InvalidLogging(_)) => "validation",
            ReconcileError::Readiness(_) => "readiness",
            ReconcileError::ContainerNotReady => "container",
            ReconcileError::Build(_) | ReconcileError::Render(_) => "build",
            ReconcileError::Workload(_) => "workload",
        }
    }
}
