use thiserror::Error;

use crate::cases::{CaseId, CaseStatus, UserId};
use crate::repository::RepositoryError;
use crate::workflows::Action;

/// Errors surfaced by the workflow core
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("`{action}` is not permitted on case {case_id} in status {status}: {reason}")]
    StateViolation {
        case_id: CaseId,
        action: Action,
        status: CaseStatus,
        reason: String,
    },

    #[error("{actor} may not `{action}`: {reason}")]
    AuthorizationViolation {
        actor: UserId,
        action: Action,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("case {case_id} was modified concurrently; re-read and retry")]
    ConcurrentModification { case_id: CaseId },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(RepositoryError),
}

impl WorkflowError {
    pub fn case_not_found(case_id: CaseId) -> Self {
        WorkflowError::NotFound {
            entity: "case",
            id: case_id.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::StateViolation { .. } => "state_violation",
            WorkflowError::AuthorizationViolation { .. } => "authorization_violation",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::ConcurrentModification { .. } => "concurrent_modification",
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::Storage(_) => "storage_error",
        }
    }

    /// Only a lost race is safe to retry after re-reading the case
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::ConcurrentModification { .. })
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { case_id, .. } => {
                WorkflowError::ConcurrentModification { case_id }
            }
            RepositoryError::CaseNotFound(case_id) => WorkflowError::case_not_found(case_id),
            other => WorkflowError::Storage(other),
        }
    }
}
