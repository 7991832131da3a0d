//! Routed-document transitions.
//!
//! A routed case moves between departments (receive, forward, release,
//! review) and, when it requires executive sign-off, up through the dean
//! and president before completing. Department-held steps are authorized by
//! comparing the actor's department with the current holder; escalated steps
//! by comparing the actor's role with the role configured for the level.

use chrono::Utc;
use std::sync::Arc;

use super::guards;
use crate::cases::{
    Actor, ApprovalLevel, Case, CaseId, CaseKind, CasePayload, CaseStatus, DepartmentId, Holder,
    RoutedStatus,
};
use crate::config::WorkflowSettings;
use crate::errors::WorkflowError;
use crate::workflows::definition::{self, Action};
use crate::workflows::{TransitionExecutor, TransitionOutcome, TransitionPlan};

#[derive(Clone)]
pub struct RoutingEngine {
    executor: TransitionExecutor,
    settings: Arc<WorkflowSettings>,
}

impl RoutingEngine {
    pub fn new(executor: TransitionExecutor, settings: Arc<WorkflowSettings>) -> Self {
        Self { executor, settings }
    }

    /// Open a routed case at TO_RECEIVE, held by `target`
    pub async fn create(
        &self,
        actor: &Actor,
        target: &DepartmentId,
        requires_escalation: bool,
        payload: CasePayload,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(None, Action::Create, actor, async {
                guards::ensure_requester_department(actor, Action::Create)?;
                payload.validate()?;
                let target =
                    guards::ensure_active_department(self.executor.repository().as_ref(), Some(target))
                        .await?;

                let case = Case::open(
                    definition::initial_status(CaseKind::Routed),
                    Holder::Department(target),
                    &actor.user_id,
                    requires_escalation,
                    payload,
                    Utc::now(),
                );
                self.executor.open(case, actor).await
            })
            .await
    }

    /// TO_RECEIVE → ONGOING by the holding department
    pub async fn receive(&self, case_id: CaseId, actor: &Actor) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Receive, actor, async {
                let case = self.executor.load_live(case_id, Action::Receive).await?;
                let to = guards::ensure_legal(&case, Action::Receive)?;
                guards::ensure_current_holder(&case, actor, Action::Receive, &self.settings)?;

                let plan = TransitionPlan::new(Action::Receive, to, case.current_holder().cloned());
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// Hand the case to another department. From ONGOING the case waits to
    /// be released; from TO_RELEASE this is the final forward and the case
    /// lands in REVIEWED.
    pub async fn forward(
        &self,
        case_id: CaseId,
        actor: &Actor,
        target: Option<&DepartmentId>,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.handoff(case_id, Action::Forward, actor, target, remarks).await
    }

    /// TO_RELEASE → TO_RECEIVE at `target`
    pub async fn release(
        &self,
        case_id: CaseId,
        actor: &Actor,
        target: Option<&DepartmentId>,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.handoff(case_id, Action::Release, actor, target, remarks).await
    }

    async fn handoff(
        &self,
        case_id: CaseId,
        action: Action,
        actor: &Actor,
        target: Option<&DepartmentId>,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), action, actor, async {
                let case = self.executor.load_live(case_id, action).await?;
                let to = guards::ensure_legal(&case, action)?;
                guards::ensure_current_holder(&case, actor, action, &self.settings)?;
                let remarks = guards::check_remarks(remarks, &self.settings)?;
                let holder = guards::ensure_target_department(
                    self.executor.repository().as_ref(),
                    &case,
                    target,
                )
                .await?;

                let plan = TransitionPlan::new(action, to, Some(holder)).with_remarks(remarks);
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// ONGOING → REVIEWED; the reviewer signs
    pub async fn review(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Review, actor, async {
                let case = self.executor.load_live(case_id, Action::Review).await?;
                let to = guards::ensure_legal(&case, Action::Review)?;
                guards::ensure_current_holder(&case, actor, Action::Review, &self.settings)?;
                let remarks = guards::check_remarks(remarks, &self.settings)?;

                let plan = TransitionPlan::new(Action::Review, to, case.current_holder().cloned())
                    .with_remarks(remarks)
                    .signed(true);
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// REVIEWED → SENT_TO_DEAN for cases that need executive sign-off
    pub async fn escalate(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Escalate, actor, async {
                let case = self.executor.load_live(case_id, Action::Escalate).await?;
                let to = guards::ensure_legal(&case, Action::Escalate)?;
                if !case.requires_escalation() {
                    return Err(guards::state_violation(
                        &case,
                        Action::Escalate,
                        "case does not require escalation",
                    ));
                }
                guards::ensure_current_holder(&case, actor, Action::Escalate, &self.settings)?;
                let remarks = guards::check_remarks(remarks, &self.settings)?;

                let plan = TransitionPlan::new(Action::Escalate, to, Some(Holder::Level(ApprovalLevel::Level1)))
                    .with_remarks(remarks);
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// SENT_TO_DEAN → SENT_TO_PRESIDENT; the dean signs
    pub async fn endorse(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Endorse, actor, async {
                let case = self.executor.load_live(case_id, Action::Endorse).await?;
                let to = guards::ensure_legal(&case, Action::Endorse)?;
                guards::ensure_current_holder(&case, actor, Action::Endorse, &self.settings)?;
                let remarks = guards::check_remarks(remarks, &self.settings)?;

                let plan = TransitionPlan::new(Action::Endorse, to, Some(Holder::Level(ApprovalLevel::Level2)))
                    .with_remarks(remarks)
                    .signed(true);
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// Finish the case. From REVIEWED only when no escalation is needed;
    /// from SENT_TO_PRESIDENT the president signs on completion.
    pub async fn complete(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Complete, actor, async {
                let case = self.executor.load_live(case_id, Action::Complete).await?;
                let to = guards::ensure_legal(&case, Action::Complete)?;
                if case.status() == CaseStatus::Routed(RoutedStatus::Reviewed) && case.requires_escalation() {
                    return Err(guards::state_violation(
                        &case,
                        Action::Complete,
                        "case must be escalated before it can be completed",
                    ));
                }
                guards::ensure_current_holder(&case, actor, Action::Complete, &self.settings)?;
                let remarks = guards::check_remarks(remarks, &self.settings)?;

                let plan = TransitionPlan::new(Action::Complete, to, None)
                    .with_remarks(remarks)
                    .signed(definition::is_signing(case.status(), Action::Complete));
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// Any non-terminal status → DECLINED. Remarks are mandatory. Once a
    /// case is escalated only the dean or president holding it, or an
    /// administrator, may decline.
    pub async fn decline(
        &self,
        case_id: CaseId,
        actor: &Actor,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.executor
            .observed(Some(case_id), Action::Decline, actor, async {
                let case = self.executor.load_live(case_id, Action::Decline).await?;
                let to = guards::ensure_legal(&case, Action::Decline)?;
                guards::ensure_holder_or_administrator(&case, actor, Action::Decline, &self.settings)?;
                let remarks = guards::require_remarks(remarks, Action::Decline, &self.settings)?;

                let plan = TransitionPlan::new(Action::Decline, to, None).with_remarks(Some(remarks));
                self.executor.execute(&case, actor, plan).await
            })
            .await
    }

    /// Administrator tombstone
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
