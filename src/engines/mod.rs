// Routing and approval engines
// Both validate against the workflow definition and commit through the
// shared transition executor

pub mod approval;
mod guards;
pub mod routing;

use crate::cases::{Actor, CaseId, CaseKind, CaseStatus, RoutedStatus};
use crate::config::WorkflowSettings;
use crate::errors::WorkflowError;
use crate::workflows::definition::{self, Action};
use crate::workflows::{TransitionExecutor, TransitionOutcome, TransitionPlan};

pub use approval::ApprovalEngine;
pub use routing::RoutingEngine;

/// Administrative tombstone shared by both engines.
///
/// Allowed from any status. A routed case that is still in flight moves to
/// DELETED and loses its holder; every other case keeps its status. Either
/// way `deleted_at` is set and the case accepts no further actions.
pub(crate) async fn soft_delete(
    executor: &TransitionExecutor,
    case_id: CaseId,
    actor: &Actor,
    remarks: Option<String>,
    settings: &WorkflowSettings,
) -> Result<TransitionOutcome, WorkflowError> {
    let case = executor.load_live(case_id, Action::Delete).await?;
    guards::ensure_administrator(actor, Action::Delete)?;
    let remarks = guards::check_remarks(remarks, settings)?;

    let in_flight =
        case.kind() == CaseKind::Routed && !definition::is_terminal(case.kind(), case.status());
    let (to, holder) = if in_flight {
        (CaseStatus::Routed(RoutedStatus::Deleted), None)
    } else {
        (case.status(), case.current_holder().cloned())
    };

    let plan = TransitionPlan::new(Action::Delete, to, holder)
        .with_remarks(remarks)
        .tombstoned();
    executor.execute(&case, actor, plan).await
}
