//! Transport-agnostic request and response types.
//!
//! A transport layer authenticates the caller, builds an [`Actor`] and hands
//! it to [`WorkflowApi`] together with the decoded request. Every failure
//! comes back as an [`ErrorResponse`] carrying a stable code, the HTTP
//! status a web transport should use, and whether a retry can help.

use serde::{Deserialize, Serialize};

use crate::cases::{Actor, CaseId, CaseKind, CasePayload, CaseStatus, DepartmentId, UserId};
use crate::errors::WorkflowError;
use crate::ledger::{LogEntry, Signature};
use crate::repository::CaseFilter;
use crate::service::{CaseView, NewCase, WorkflowService};
use crate::workflows::{Action, TransitionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub action: Action,
    pub actor_id: UserId,
    #[serde(default)]
    pub target_department_id: Option<DepartmentId>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub case_id: CaseId,
    pub new_status: CaseStatus,
    pub log_entry_id: u64,
}

impl From<&TransitionOutcome> for TransitionResponse {
    fn from(outcome: &TransitionOutcome) -> Self {
        Self {
            case_id: outcome.case.id(),
            new_status: outcome.case.status(),
            log_entry_id: outcome.log_entry.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCaseRequest {
    pub kind: CaseKind,
    pub actor_id: UserId,
    #[serde(default)]
    pub target_department_id: Option<DepartmentId>,
    #[serde(default)]
    pub requires_escalation: bool,
    pub payload: CasePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    pub http_status: u16,
}

impl From<&WorkflowError> for ErrorResponse {
    fn from(error: &WorkflowError) -> Self {
        let http_status = match error {
            WorkflowError::StateViolation { .. } | WorkflowError::ConcurrentModification { .. } => 409,
            WorkflowError::AuthorizationViolation { .. } => 403,
            WorkflowError::NotFound { .. } => 404,
            WorkflowError::Validation(_) => 422,
            WorkflowError::Storage(_) => 500,
        };
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            http_status,
        }
    }
}

impl From<WorkflowError> for ErrorResponse {
    fn from(error: WorkflowError) -> Self {
        ErrorResponse::from(&error)
    }
}

#[derive(Clone)]
pub struct WorkflowApi {
    service: WorkflowService,
}

impl WorkflowApi {
    pub fn new(service: WorkflowService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &WorkflowService {
        &self.service
    }

    /// The body may name an actor only if it is the authenticated one
    fn ensure_same_actor(actor: &Actor, claimed: &UserId, action: Action) -> Result<(), ErrorResponse> {
        if &actor.user_id == claimed {
            return Ok(());
        }
        Err(ErrorResponse::from(WorkflowError::AuthorizationViolation {
            actor: actor.user_id.clone(),
            action,
            reason: format!("request names actor {claimed}"),
        }))
    }

    pub async fn create_case(
        &self,
        actor: &Actor,
        request: CreateCaseRequest,
    ) -> Result<TransitionResponse, ErrorResponse> {
        Self::ensure_same_actor(actor, &request.actor_id, Action::Create)?;
        let new_case = NewCase {
            kind: request.kind,
            target_department: request.target_department_id,
            requires_escalation: request.requires_escalation,
            payload: request.payload,
        };
        let outcome = self.service.create_case(actor, new_case).await?;
        Ok(TransitionResponse::from(&outcome))
    }

    pub async fn transition(
        &self,
        actor: &Actor,
        case_id: CaseId,
        request: TransitionRequest,
    ) -> Result<TransitionResponse, ErrorResponse> {
        Self::ensure_same_actor(actor, &request.actor_id, request.action)?;
        let outcome = self
            .service
            .dispatch(
                case_id,
                request.action,
                actor,
                request.target_department_id.as_ref(),
                request.remarks,
            )
            .await?;
        Ok(TransitionResponse::from(&outcome))
    }

    pub async fn case(&self, case_id: CaseId) -> Result<CaseView, ErrorResponse> {
        Ok(self.service.case_view(case_id, false).await?)
    }

    pub async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<CaseView>, ErrorResponse> {
        Ok(self.service.list_cases(filter).await?)
    }

    pub async fn history(&self, case_id: CaseId) -> Result<Vec<LogEntry>, ErrorResponse> {
        Ok(self.service.history_for(case_id).await?)
    }

    pub async fn signatures(&self, case_id: CaseId) -> Result<Vec<Signature>, ErrorResponse> {
        Ok(self.service.signatures_for(case_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryError;

    #[test]
    fn test_error_status_mapping() {
        let conflict = ErrorResponse::from(WorkflowError::ConcurrentModification {
            case_id: CaseId::new(),
        });
        assert_eq!(conflict.http_status, 409);
        assert!(conflict.retryable);
        assert_eq!(conflict.code, "concurrent_modification");

        let storage = ErrorResponse::from(WorkflowError::Storage(RepositoryError::Backend("io".into())));
        assert_eq!(storage.http_status, 500);
        assert!(!storage.retryable);

        let validation = ErrorResponse::from(WorkflowError::Validation("bad".into()));
        assert_eq!(validation.http_status, 422);
    }

    #[test]
    fn test_transition_request_decodes_snake_case_action() {
        let request: TransitionRequest = serde_json::from_str(
            r#"{"action":"approve_level1","actor_id":"dean"}"#,
        )
        .unwrap();
        assert_eq!(request.action, Action::ApproveLevel1);
        assert_eq!(request.target_department_id, None);
    }
}
