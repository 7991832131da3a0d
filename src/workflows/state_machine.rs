// Atomic case transitions
// A transition either commits case, log entry and signature together or
// leaves the store untouched

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::cases::{Actor, Case, CaseId, CaseStatus, Holder};
use crate::errors::WorkflowError;
use crate::ledger::{LogEntry, NewLogEntry};
use crate::notify::{NotificationSink, TransitionNotice};
use crate::observability::{OperationTimer, TransitionMetrics};
use crate::repository::{CaseRepository, SignatureRequest, UnitOfWork};
use crate::telemetry::{create_transition_span, generate_correlation_id};

use super::definition::Action;

/// A validated move, ready to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub action: Action,
    pub to: CaseStatus,
    pub holder: Option<Holder>,
    pub remarks: Option<String>,
    /// Record a signature for the acting user
    pub signs: bool,
    /// Mark the case deleted
    pub tombstone: bool,
}

impl TransitionPlan {
    pub fn new(action: Action, to: CaseStatus, holder: Option<Holder>) -> Self {
        Self {
            action,
            to,
            holder,
            remarks: None,
            signs: false,
            tombstone: false,
        }
    }

    pub fn with_remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }

    pub fn signed(mut self, signs: bool) -> Self {
        self.signs = signs;
        self
    }

    pub fn tombstoned(mut self) -> Self {
        self.tombstone = true;
        self
    }
}

/// What a committed transition produced
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub case: Case,
    pub log_entry: LogEntry,
    pub signature_recorded: bool,
}

/// Applies validated plans against the repository.
///
/// Validation lives in the engines; the executor only builds the unit of
/// work, commits it with the version the plan was validated against, and
/// fires the notification hook after a successful commit.
#[derive(Clone)]
pub struct TransitionExecutor {
    repository: Arc<dyn CaseRepository>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Arc<TransitionMetrics>,
}

impl TransitionExecutor {
    pub fn new(
        repository: Arc<dyn CaseRepository>,
        notifier: Arc<dyn NotificationSink>,
        metrics: Arc<TransitionMetrics>,
    ) -> Self {
        Self {
            repository,
            notifier,
            metrics,
        }
    }

    pub fn repository(&self) -> &Arc<dyn CaseRepository> {
        &self.repository
    }

    pub fn metrics(&self) -> &Arc<TransitionMetrics> {
        &self.metrics
    }

    /// Load a case that can still be acted on. Tombstoned cases are frozen.
    pub async fn load_live(&self, case_id: CaseId, action: Action) -> Result<Case, WorkflowError> {
        let case = self
            .repository
            .load_case(case_id)
            .await?
            .ok_or_else(|| WorkflowError::case_not_found(case_id))?;

        if case.is_deleted() {
            return Err(WorkflowError::StateViolation {
                case_id,
                action,
                status: case.status(),
                reason: "case has been deleted".to_string(),
            });
        }
        Ok(case)
    }

    /// Store a freshly opened case with its CREATED entry
    pub async fn open(&self, case: Case, actor: &Actor) -> Result<TransitionOutcome, WorkflowError> {
        let entry = NewLogEntry {
            case_id: case.id(),
            action: Action::Create.audit_action(),
            from_status: None,
            to_status: case.status(),
            from_holder: None,
            to_holder: case.current_holder().cloned(),
            actor_id: actor.user_id.clone(),
            remarks: None,
            created_at: case.created_at(),
        };

        let log_entry = self.repository.insert_case(case.clone(), entry).await?;
        self.metrics.record_commit(false);

        info!(
            case_id = %case.id(),
            kind = %case.kind(),
            status = %case.status(),
            actor = %actor.user_id,
            "Case opened"
        );
        self.notify(&case, &log_entry);

        Ok(TransitionOutcome {
            case,
            log_entry,
            signature_recorded: false,
        })
    }

    /// Commit `plan` against `case` as read. Fails with
    /// `ConcurrentModification` when the stored version has moved on.
    pub async fn execute(
        &self,
        case: &Case,
        actor: &Actor,
        plan: TransitionPlan,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let now = Utc::now();
        let mut next = case.clone();
        next.advance(plan.to, plan.holder, now);
        if plan.tombstone {
            next.deleted_at = Some(now);
        }

        let entry = NewLogEntry {
            case_id: case.id(),
            action: plan.action.audit_action(),
            from_status: Some(case.status()),
            to_status: next.status(),
            from_holder: case.current_holder().cloned(),
            to_holder: next.current_holder().cloned(),
            actor_id: actor.user_id.clone(),
            remarks: plan.remarks,
            created_at: now,
        };
        let signature = plan.signs.then(|| SignatureRequest {
            actor_id: actor.user_id.clone(),
            signed_at: now,
        });

        let receipt = self
            .repository
            .commit(UnitOfWork {
                case: next,
                expected_version: case.version(),
                entry,
                signature,
            })
            .await?;

        self.metrics.record_commit(receipt.signature_recorded);
        info!(
            case_id = %case.id(),
            action = %plan.action,
            from = %case.status(),
            to = %receipt.case.status(),
            holder = ?receipt.case.current_holder().map(Holder::encode),
            version = receipt.case.version(),
            signed = receipt.signature_recorded,
            "Transition committed"
        );
        self.notify(&receipt.case, &receipt.log_entry);

        Ok(TransitionOutcome {
            case: receipt.case,
            log_entry: receipt.log_entry,
            signature_recorded: receipt.signature_recorded,
        })
    }

    /// Run one engine operation inside a `transition` span, counting and
    /// logging the outcome
    pub async fn observed<T, F>(
        &self,
        case_id: Option<CaseId>,
        action: Action,
        actor: &Actor,
        operation: F,
    ) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, WorkflowError>>,
    {
        let case_label = case_id.map(|id| id.to_string()).unwrap_or_else(|| "new".to_string());
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            &case_label,
            action.as_str(),
            actor.user_id.as_str(),
            &correlation_id,
        );

        let timer = OperationTimer::new(action.as_str());
        let result = operation.instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(_) => timer.finish(),
            Err(error) => {
                self.metrics.record_rejection(error);
                warn!(
                    case_id = %case_label,
                    action = %action,
                    actor = %actor.user_id,
                    code = error.code(),
                    error = %error,
                    "Transition rejected"
                );
            }
        });
        result
    }

    fn notify(&self, case: &Case, entry: &LogEntry) {
        let notice = TransitionNotice {
            case_id: case.id(),
            action: entry.action,
            new_status: case.status(),
            actor_id: entry.actor_id.clone(),
            timestamp: entry.created_at,
        };

        if let Err(e) = self.notifier.notify(&notice) {
            warn!(case_id = %case.id(), error = %e, "Notification delivery failed");
            self.metrics.record_notification_dropped();
        }
    }
}
