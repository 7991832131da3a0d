//! Hierarchical two-level approval.

use chrono::Utc;
use std::sync::Arc;

use super::guards;
use crate::cases::{Actor, ApprovalLevel, Case, CaseId, CaseKind, CasePayload, Holder};
use crate::config::WorkflowSettings;
use crate::errors::WorkflowError;
use crate::workflows::definition::{self, Action};
use crate::workflows::{TransitionExecutor, TransitionOutcome, TransitionPlan};

#[derive(Clone)]
pub struct ApprovalEngine {
    executor: TransitionExecutor,
    settings: Arc<WorkflowSettings>,
}

impl ApprovalEngine {
    pub fn new(executor: TransitionExecutor, settings: Arc<WorkflowSettings>) -> Self {
        Self { executor, settings }
    }

    /// Open a hierarchical case at PENDING, waiting on level 1
    pub async fn create(
        &self,
        actor: &Actor,
        payload: CasePayload,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(None, Action::Create, actor, async {
                payload.validate()?;
                let case = Case::open(
                    definition::initial_status(CaseKind::Hierarchical),
                    Holder::Level(ApprovalLevel::Level1),
                    &actor.user_id,
                    false,
                    payload,
                    Utc::now(),
                );
                self.executor.open(case, actor).await
            })
            .await
    }

    /// PENDING → APPROVED_LEVEL1, signed by the level-1 role
    pub async fn approve_level1(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.approve(case_id, Action::ApproveLevel1, actor, remarks, Some(Holder::Level(ApprovalLevel::Level2)))
            .await
    }

    /// APPROVED_LEVEL1 → APPROVED_LEVEL2, signed by the level-2 role
    pub async fn approve_level2(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.approve(case_id, Action::ApproveLevel2, actor, remarks, None).await
    }

    async fn approve(
        &self,
        case_id: CaseId,
        action: Action,
        actor: &Actor,
        remarks: Option<String>,
        next_holder: Option<Holder>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), action, actor, async {
                let case = self.executor.load_live(case_id, action).await?;
                let to = guards::ensure_legal(&case, action)?;
                guards::ensure_current_holder(&case, actor, action, &self.settings)?;
                let remarks = guards::check_remarks(remarks, &self.settings)?;

                let plan = TransitionPlan::new(action, to, next_holder)
                    .with_remarks(remarks)
                    .signed(true);
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// Reject at whichever level is pending. Only that level's role may
    /// reject, and remarks are mandatory.
    pub async fn reject(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Reject, actor, async {
                let case = self.executor.load_live(case_id, Action::Reject).await?;
                let to = guards::ensure_legal(&case, Action::Reject)?;
                guards::ensure_current_holder(&case, actor, Action::Reject, &self.settings)?;
                let remarks = guards::require_remarks(remarks, Action::Reject, &self.settings)?;

                let plan = TransitionPlan::new(Action::Reject, to, None).with_remarks(Some(remarks));
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// Administrator tombstone; the approval status is kept
    pub async fn soft_delete(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(
                Some(case_id),
                Action::Delete,
                actor,
                super::soft_delete(&self.executor, case_id, actor, remarks, &self.settings),
            )
            .await
    }
}
