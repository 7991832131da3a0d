//! Workflow service: one explicit object owning the repository, the
//! notification sink, settings and metrics. Both engines are views over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::cases::{
    Actor, Case, CaseId, CaseKind, CasePayload, CaseStatus, Department, DepartmentId, Holder, UserId,
};
use crate::config::WorkflowSettings;
use crate::engines::{ApprovalEngine, RoutingEngine};
use crate::errors::WorkflowError;
use crate::ledger::{AuditLog, LogEntry, Signature, SignatureLedger};
use crate::notify::{ChannelNotifier, NoopNotifier, NotificationSink, TransitionNotice};
use crate::observability::{TransitionMetrics, TransitionStats};
use crate::repository::{CaseFilter, CaseRepository, InMemoryCaseRepository};
use crate::workflows::definition::{self, Action};
use crate::workflows::{TransitionExecutor, TransitionOutcome};

/// Input for opening a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCase {
    pub kind: CaseKind,
    /// Department that receives a routed case first
    #[serde(default)]
    pub target_department: Option<DepartmentId>,
    #[serde(default)]
    pub requires_escalation: bool,
    pub payload: CasePayload,
}

impl NewCase {
    pub fn routed(target: impl Into<String>, payload: CasePayload) -> Self {
        Self {
            kind: CaseKind::Routed,
            target_department: Some(DepartmentId(target.into())),
            requires_escalation: false,
            payload,
        }
    }

    pub fn hierarchical(payload: CasePayload) -> Self {
        Self {
            kind: CaseKind::Hierarchical,
            target_department: None,
            requires_escalation: false,
            payload,
        }
    }

    pub fn escalated(mut self) -> Self {
        self.requires_escalation = true;
        self
    }
}

/// Read model of a case with its derived flags and legal next actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseView {
    pub id: CaseId,
    pub kind: CaseKind,
    pub status: CaseStatus,
    pub current_holder: Option<Holder>,
    pub last_holder: Option<Holder>,
    pub requester_id: UserId,
    pub requires_escalation: bool,
    pub payload: CasePayload,
    pub signatures: Vec<UserId>,
    pub level1_signed: bool,
    pub level2_signed: bool,
    pub awaiting_level1: bool,
    pub awaiting_level2: bool,
    pub in_dean: bool,
    pub in_president: bool,
    pub has_dean_signature: bool,
    pub has_president_signature: bool,
    pub legal_actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<&Case> for CaseView {
    fn from(case: &Case) -> Self {
        let legal_actions = if case.is_deleted() {
            Vec::new()
        } else {
            definition::legal_transitions(case.kind(), case.status())
                .into_iter()
                .map(|t| t.action)
                .collect()
        };

        Self {
            id: case.id(),
            kind: case.kind(),
            status: case.status(),
            current_holder: case.current_holder().cloned(),
            last_holder: case.last_holder().cloned(),
            requester_id: case.requester_id().clone(),
            requires_escalation: case.requires_escalation(),
            payload: case.payload().clone(),
            signatures: case.signatures().to_vec(),
            level1_signed: case.level1_signed(),
            level2_signed: case.level2_signed(),
            awaiting_level1: case.awaiting_level1(),
            awaiting_level2: case.awaiting_level2(),
            in_dean: case.in_dean(),
            in_president: case.in_president(),
            has_dean_signature: case.has_dean_signature(),
            has_president_signature: case.has_president_signature(),
            legal_actions,
            created_at: case.created_at(),
            updated_at: case.updated_at(),
            deleted_at: case.deleted_at(),
            version: case.version(),
        }
    }
}

#[derive(Clone)]
pub struct WorkflowService {
    repository: Arc<dyn CaseRepository>,
    settings: Arc<WorkflowSettings>,
    metrics: Arc<TransitionMetrics>,
    routing: RoutingEngine,
    approvals: ApprovalEngine,
    audit: AuditLog,
    ledger: SignatureLedger,
}

impl WorkflowService {
    pub fn new(
        repository: Arc<dyn CaseRepository>,
        notifier: Arc<dyn NotificationSink>,
        settings: WorkflowSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        let metrics = Arc::new(TransitionMetrics::new());
        let executor = TransitionExecutor::new(repository.clone(), notifier, metrics.clone());

        Self {
            routing: RoutingEngine::new(executor.clone(), settings.clone()),
            approvals: ApprovalEngine::new(executor, settings.clone()),
            audit: AuditLog::new(repository.clone()),
            ledger: SignatureLedger::new(repository.clone()),
            repository,
            settings,
            metrics,
        }
    }

    /// Service over a fresh in-memory store with default settings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryCaseRepository::new()),
            Arc::new(NoopNotifier),
            WorkflowSettings::default(),
        )
    }

    /// Service that publishes notices on a channel sized by
    /// `settings.notification_buffer`
    pub fn with_channel(
        repository: Arc<dyn CaseRepository>,
        settings: WorkflowSettings,
    ) -> (Self, mpsc::Receiver<TransitionNotice>) {
        let (notifier, receiver) = ChannelNotifier::channel(settings.notification_buffer);
        (Self::new(repository, Arc::new(notifier), settings), receiver)
    }

    pub fn routing(&self) -> &RoutingEngine {
        &self.routing
    }

    pub fn approvals(&self) -> &ApprovalEngine {
        &self.approvals
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn stats(&self) -> TransitionStats {
        self.metrics.get_stats()
    }

    pub fn log_stats(&self) {
        self.metrics.log_stats();
    }

    pub async fn register_department(&self, department: Department) -> Result<(), WorkflowError> {
        info!(department = %department.id, active = department.is_active, "Registering department");
        self.repository.upsert_department(department).await?;
        Ok(())
    }

    pub async fn departments(&self) -> Result<Vec<Department>, WorkflowError> {
        Ok(self.repository.departments().await?)
    }

    pub async fn create_case(&self, actor: &Actor, new_case: NewCase) -> Result<TransitionOutcome, WorkflowError> {
        match new_case.kind {
            CaseKind::Routed => {
                let target = new_case.target_department.ok_or_else(|| {
                    WorkflowError::Validation("routed cases need a target department".to_string())
                })?;
                self.routing
                    .create(actor, &target, new_case.requires_escalation, new_case.payload)
                    .await
            }
            CaseKind::Hierarchical => {
                if new_case.target_department.is_some() || new_case.requires_escalation {
                    return Err(WorkflowError::Validation(
                        "hierarchical cases take neither a target department nor escalation".to_string(),
                    ));
                }
                self.approvals.create(actor, new_case.payload).await
            }
        }
    }

    /// Route a named action to the engine that owns it
    pub async fn dispatch(
        &self,
        case_id: CaseId,
        action: Action,
        actor: &Actor,
        target: Option<&DepartmentId>,
        remarks: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        match action {
            Action::Create => Err(WorkflowError::Validation(
                "cases are opened with create_case".to_string(),
            )),
            Action::Receive => self.routing.receive(case_id, actor).await,
            Action::Forward => self.routing.forward(case_id, actor, target, remarks).await,
            Action::Release => self.routing.release(case_id, actor, target, remarks).await,
            Action::Review => self.routing.review(case_id, actor, remarks).await,
            Action::Escalate => self.routing.escalate(case_id, actor, remarks).await,
            Action::Endorse => self.routing.endorse(case_id, actor, remarks).await,
            Action::Complete => self.routing.complete(case_id, actor, remarks).await,
            Action::Decline => self.routing.decline(case_id, actor, remarks).await,
            // shared by both engines
            Action::Delete => self.routing.soft_delete(case_id, actor, remarks).await,
            Action::ApproveLevel1 => self.approvals.approve_level1(case_id, actor, remarks).await,
            Action::ApproveLevel2 => self.approvals.approve_level2(case_id, actor, remarks).await,
            Action::Reject => self.approvals.reject(case_id, actor, remarks).await,
        }
    }

    /// Case with derived flags. Tombstoned cases are `NotFound` unless
    /// `include_deleted` is set.
    pub async fn case_view(&self, case_id: CaseId, include_deleted: bool) -> Result<CaseView, WorkflowError> {
        match self.repository.load_case(case_id).await? {
            Some(case) if include_deleted || !case.is_deleted() => Ok(CaseView::from(&case)),
            _ => Err(WorkflowError::case_not_found(case_id)),
        }
    }

    pub async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<CaseView>, WorkflowError> {
        let cases = self.repository.list_cases(filter).await?;
        Ok(cases.iter().map(CaseView::from).collect())
    }

    pub async fn history_for(&self, case_id: CaseId) -> Result<Vec<LogEntry>, WorkflowError> {
        self.audit.history_for(case_id).await
    }

    pub async fn signatures_for(&self, case_id: CaseId) -> Result<Vec<Signature>, WorkflowError> {
        self.ledger.signatures_for(case_id).await
    }

    /// Record a signature for `action` outside a transition; repeated calls
    /// are no-ops, deleted or closed cases refuse it
    pub async fn record_signature(
        &self,
        case_id: CaseId,
        actor: &Actor,
        action: Action,
    ) -> Result<bool, WorkflowError> {
        self.ledger.record_signature(case_id, &actor.user_id, action).await
    }
}
