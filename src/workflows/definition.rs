//! Declarative workflow definition.
//!
//! Every legal move for both case kinds lives in the two tables below. The
//! routing and approval engines consult these tables and nothing else when
//! deciding whether an action is legal from a status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cases::{ApprovalStatus, CaseKind, CaseStatus, RoutedStatus};
use crate::ledger::AuditAction;

/// Actions a caller may request against a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Receive,
    Forward,
    Release,
    Review,
    Escalate,
    Endorse,
    Decline,
    Complete,
    Delete,
    #[serde(rename = "approve_level1")]
    ApproveLevel1,
    #[serde(rename = "approve_level2")]
    ApproveLevel2,
    Reject,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::Create,
        Action::Receive,
        Action::Forward,
        Action::Release,
        Action::Review,
        Action::Escalate,
        Action::Endorse,
        Action::Decline,
        Action::Complete,
        Action::Delete,
        Action::ApproveLevel1,
        Action::ApproveLevel2,
        Action::Reject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Receive => "receive",
            Action::Forward => "forward",
            Action::Release => "release",
            Action::Review => "review",
            Action::Escalate => "escalate",
            Action::Endorse => "endorse",
            Action::Decline => "decline",
            Action::Complete => "complete",
            Action::Delete => "delete",
            Action::ApproveLevel1 => "approve_level1",
            Action::ApproveLevel2 => "approve_level2",
            Action::Reject => "reject",
        }
    }

    /// Ledger label recorded when this action commits
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Action::Create => AuditAction::Created,
            Action::Receive => AuditAction::Received,
            Action::Forward => AuditAction::Forwarded,
            Action::Release => AuditAction::Released,
            Action::Review => AuditAction::Reviewed,
            Action::Escalate => AuditAction::Escalated,
            Action::Endorse => AuditAction::Endorsed,
            Action::Decline => AuditAction::Declined,
            Action::Complete => AuditAction::Completed,
            Action::Delete => AuditAction::Deleted,
            Action::ApproveLevel1 => AuditAction::ApprovedLevel1,
            Action::ApproveLevel2 => AuditAction::ApprovedLevel2,
            Action::Reject => AuditAction::Rejected,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('-', "_");
        Action::ALL
            .iter()
            .find(|a| a.as_str() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// One legal move out of a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub action: Action,
    pub to: CaseStatus,
}

const ROUTED_TRANSITIONS: &[(RoutedStatus, Action, RoutedStatus)] = &[
    (RoutedStatus::ToReceive, Action::Receive, RoutedStatus::Ongoing),
    (RoutedStatus::Ongoing, Action::Forward, RoutedStatus::ToRelease),
    (RoutedStatus::Ongoing, Action::Review, RoutedStatus::Reviewed),
    (RoutedStatus::ToRelease, Action::Forward, RoutedStatus::Reviewed),
    (RoutedStatus::ToRelease, Action::Release, RoutedStatus::ToReceive),
    (RoutedStatus::Reviewed, Action::Escalate, RoutedStatus::SentToDean),
    (RoutedStatus::Reviewed, Action::Complete, RoutedStatus::Completed),
    (RoutedStatus::SentToDean, Action::Endorse, RoutedStatus::SentToPresident),
    (RoutedStatus::SentToPresident, Action::Complete, RoutedStatus::Completed),
    // decline branch from every non-terminal state
    (RoutedStatus::ToReceive, Action::Decline, RoutedStatus::Declined),
    (RoutedStatus::Ongoing, Action::Decline, RoutedStatus::Declined),
    (RoutedStatus::ToRelease, Action::Decline, RoutedStatus::Declined),
    (RoutedStatus::Reviewed, Action::Decline, RoutedStatus::Declined),
    (RoutedStatus::SentToDean, Action::Decline, RoutedStatus::Declined),
    (RoutedStatus::SentToPresident, Action::Decline, RoutedStatus::Declined),
];

const APPROVAL_TRANSITIONS: &[(ApprovalStatus, Action, ApprovalStatus)] = &[
    (ApprovalStatus::Pending, Action::ApproveLevel1, ApprovalStatus::ApprovedLevel1),
    (ApprovalStatus::ApprovedLevel1, Action::ApproveLevel2, ApprovalStatus::ApprovedLevel2),
    (ApprovalStatus::Pending, Action::Reject, ApprovalStatus::Rejected),
    (ApprovalStatus::ApprovedLevel1, Action::Reject, ApprovalStatus::Rejected),
];

/// Status a freshly created case starts in
pub fn initial_status(kind: CaseKind) -> CaseStatus {
    match kind {
        CaseKind::Routed => CaseStatus::Routed(RoutedStatus::ToReceive),
        CaseKind::Hierarchical => CaseStatus::Hierarchical(ApprovalStatus::Pending),
    }
}

/// Full state set of a kind
pub fn states(kind: CaseKind) -> Vec<CaseStatus> {
    match kind {
        CaseKind::Routed => RoutedStatus::ALL.iter().map(|s| CaseStatus::Routed(*s)).collect(),
        CaseKind::Hierarchical => ApprovalStatus::ALL
            .iter()
            .map(|s| CaseStatus::Hierarchical(*s))
            .collect(),
    }
}

pub fn is_terminal(kind: CaseKind, status: CaseStatus) -> bool {
    match (kind, status) {
        (CaseKind::Routed, CaseStatus::Routed(s)) => matches!(
            s,
            RoutedStatus::Completed | RoutedStatus::Declined | RoutedStatus::Deleted
        ),
        (CaseKind::Hierarchical, CaseStatus::Hierarchical(s)) => {
            matches!(s, ApprovalStatus::ApprovedLevel2 | ApprovalStatus::Rejected)
        }
        // a status outside the kind's set has nowhere to go
        _ => true,
    }
}

pub fn legal_transitions(kind: CaseKind, from: CaseStatus) -> Vec<Transition> {
    match (kind, from) {
        (CaseKind::Routed, CaseStatus::Routed(from)) => ROUTED_TRANSITIONS
            .iter()
            .filter(|(f, _, _)| *f == from)
            .map(|(_, action, to)| Transition {
                action: *action,
                to: CaseStatus::Routed(*to),
            })
            .collect(),
        (CaseKind::Hierarchical, CaseStatus::Hierarchical(from)) => APPROVAL_TRANSITIONS
            .iter()
            .filter(|(f, _, _)| *f == from)
            .map(|(_, action, to)| Transition {
                action: *action,
                to: CaseStatus::Hierarchical(*to),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Target status of `action` from `from`, if the table allows it
pub fn resolve(from: CaseStatus, action: Action) -> Option<CaseStatus> {
    legal_transitions(from.kind(), from)
        .into_iter()
        .find(|t| t.action == action)
        .map(|t| t.to)
}

/// Whether committing `action` from `from` records a signature for the actor
pub fn is_signing(from: CaseStatus, action: Action) -> bool {
    match action {
        Action::Review | Action::Endorse | Action::ApproveLevel1 | Action::ApproveLevel2 => true,
        Action::Complete => from == CaseStatus::Routed(RoutedStatus::SentToPresident),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_transitions() {
        for kind in [CaseKind::Routed, CaseKind::Hierarchical] {
            for status in states(kind) {
                assert_eq!(
                    is_terminal(kind, status),
                    legal_transitions(kind, status).is_empty(),
                    "terminal flag disagrees with table for {status}"
                );
            }
        }
    }

    #[test]
    fn test_transitions_stay_within_kind() {
        for kind in [CaseKind::Routed, CaseKind::Hierarchical] {
            let set = states(kind);
            for status in &set {
                for t in legal_transitions(kind, *status) {
                    assert!(set.contains(&t.to), "{} escapes {kind}", t.to);
                }
            }
        }
    }

    #[test]
    fn test_routed_main_path() {
        let path = [
            (RoutedStatus::ToReceive, Action::Receive, RoutedStatus::Ongoing),
            (RoutedStatus::Ongoing, Action::Forward, RoutedStatus::ToRelease),
            (RoutedStatus::ToRelease, Action::Forward, RoutedStatus::Reviewed),
            (RoutedStatus::Reviewed, Action::Complete, RoutedStatus::Completed),
        ];
        for (from, action, to) in path {
            assert_eq!(resolve(from.into(), action), Some(to.into()));
        }
    }

    #[test]
    fn test_escalation_path() {
        assert_eq!(
            resolve(RoutedStatus::Reviewed.into(), Action::Escalate),
            Some(RoutedStatus::SentToDean.into())
        );
        assert_eq!(
            resolve(RoutedStatus::SentToDean.into(), Action::Endorse),
            Some(RoutedStatus::SentToPresident.into())
        );
        assert_eq!(
            resolve(RoutedStatus::SentToPresident.into(), Action::Complete),
            Some(RoutedStatus::Completed.into())
        );
        assert_eq!(resolve(RoutedStatus::SentToDean.into(), Action::Complete), None);
    }

    #[test]
    fn test_decline_reachable_from_every_non_terminal_routed_state() {
        for status in states(CaseKind::Routed) {
            let declinable = resolve(status, Action::Decline).is_some();
            assert_eq!(declinable, !is_terminal(CaseKind::Routed, status), "{status}");
        }
    }

    #[test]
    fn test_reject_never_from_approved_level2() {
        assert_eq!(
            resolve(ApprovalStatus::Pending.into(), Action::Reject),
            Some(ApprovalStatus::Rejected.into())
        );
        assert_eq!(
            resolve(ApprovalStatus::ApprovedLevel1.into(), Action::Reject),
            Some(ApprovalStatus::Rejected.into())
        );
        assert_eq!(resolve(ApprovalStatus::ApprovedLevel2.into(), Action::Reject), None);
    }

    #[test]
    fn test_cross_kind_lookup_is_empty() {
        assert!(legal_transitions(CaseKind::Hierarchical, RoutedStatus::Ongoing.into()).is_empty());
        assert_eq!(resolve(RoutedStatus::Ongoing.into(), Action::ApproveLevel1), None);
        assert_eq!(resolve(ApprovalStatus::Pending.into(), Action::Receive), None);
    }

    #[test]
    fn test_create_and_delete_are_outside_the_tables() {
        for kind in [CaseKind::Routed, CaseKind::Hierarchical] {
            for status in states(kind) {
                let actions: Vec<Action> =
                    legal_transitions(kind, status).iter().map(|t| t.action).collect();
                assert!(!actions.contains(&Action::Create));
                assert!(!actions.contains(&Action::Delete));
            }
        }
    }

    #[test]
    fn test_signing_actions() {
        assert!(is_signing(ApprovalStatus::Pending.into(), Action::ApproveLevel1));
        assert!(is_signing(RoutedStatus::SentToDean.into(), Action::Endorse));
        assert!(is_signing(RoutedStatus::SentToPresident.into(), Action::Complete));
        assert!(!is_signing(RoutedStatus::Reviewed.into(), Action::Complete));
        assert!(!is_signing(ApprovalStatus::Pending.into(), Action::Reject));
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("approve-level1".parse::<Action>(), Ok(Action::ApproveLevel1));
        assert_eq!("FORWARD".parse::<Action>(), Ok(Action::Forward));
        assert!("teleport".parse::<Action>().is_err());
    }

    #[test]
    fn test_initial_statuses() {
        assert_eq!(initial_status(CaseKind::Routed), RoutedStatus::ToReceive.into());
        assert_eq!(initial_status(CaseKind::Hierarchical), ApprovalStatus::Pending.into());
    }
}
