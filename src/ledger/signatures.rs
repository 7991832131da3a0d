use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::cases::{CaseId, UserId};
use crate::errors::WorkflowError;
use crate::repository::{CaseRepository, RepositoryError};
use crate::workflows::definition::{self, Action};

/// One actor's mark on one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub case_id: CaseId,
    pub actor_id: UserId,
    pub signed_at: DateTime<Utc>,
}

/// Deduplicated record of who signed which case
#[derive(Clone)]
pub struct SignatureLedger {
    repository: Arc<dyn CaseRepository>,
}

impl SignatureLedger {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }

    /// Record that `actor_id` signed `case_id` as part of `action`. Signing
    /// twice is a no-op; returns whether a new entry was written. Deleted
    /// and finished cases take no new signatures.
    pub async fn record_signature(
        &self,
        case_id: CaseId,
        actor_id: &UserId,
        action: Action,
    ) -> Result<bool, WorkflowError> {
        let case = self
            .repository
            .load_case(case_id)
            .await?
            .ok_or_else(|| WorkflowError::case_not_found(case_id))?;

        let closed = if case.is_deleted() {
            Some("case has been deleted")
        } else if definition::is_terminal(case.kind(), case.status()) {
            Some("case is closed")
        } else {
            None
        };
        if let Some(reason) = closed {
            return Err(WorkflowError::StateViolation {
                case_id,
                action,
                status: case.status(),
                reason: reason.to_string(),
            });
        }

        let signature = Signature {
            case_id,
            actor_id: actor_id.clone(),
            signed_at: Utc::now(),
        };

        match self.repository.insert_signature(signature).await {
            Ok(()) => Ok(true),
            Err(RepositoryError::DuplicateSignature { .. }) => {
                debug!(case_id = %case_id, actor = %actor_id, "Signature already recorded");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Signatures on a case ordered by signing time
    pub async fn signatures_for(&self, case_id: CaseId) -> Result<Vec<Signature>, WorkflowError> {
        if self.repository.load_case(case_id).await?.is_none() {
            return Err(WorkflowError::case_not_found(case_id));
        }
        let mut signatures = self.repository.signatures(case_id).await?;
        // stable sort keeps insertion order for equal timestamps
        signatures.sort_by(|a, b| a.signed_at.cmp(&b.signed_at));
        Ok(signatures)
    }
}
