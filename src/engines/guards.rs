//! Checks shared by the routing and approval engines.
//!
//! Engines call these in a fixed order: legality, then authorization, then
//! input validation, so a caller always learns about the most fundamental
//! problem first.

use crate::cases::{Actor, Case, CaseStatus, DepartmentId, Holder};
use crate::config::WorkflowSettings;
use crate::errors::WorkflowError;
use crate::repository::CaseRepository;
use crate::workflows::definition::{self, Action};

/// Target status of `action`, or `StateViolation` if the table forbids it
pub(crate) fn ensure_legal(case: &Case, action: Action) -> Result<CaseStatus, WorkflowError> {
    definition::resolve(case.status(), action).ok_or_else(|| {
        let reason = if definition::is_terminal(case.kind(), case.status()) {
            "case is in a terminal state".to_string()
        } else {
            format!("`{action}` is not a legal move from {}", case.status())
        };
        state_violation(case, action, reason)
    })
}

pub(crate) fn state_violation(case: &Case, action: Action, reason: impl Into<String>) -> WorkflowError {
    WorkflowError::StateViolation {
        case_id: case.id(),
        action,
        status: case.status(),
        reason: reason.into(),
    }
}

fn authorization_violation(actor: &Actor, action: Action, reason: impl Into<String>) -> WorkflowError {
    WorkflowError::AuthorizationViolation {
        actor: actor.user_id.clone(),
        action,
        reason: reason.into(),
    }
}

/// Whether `actor` is the party the case currently waits on
pub(crate) fn is_current_holder(case: &Case, actor: &Actor, settings: &WorkflowSettings) -> bool {
    match case.current_holder() {
        Some(Holder::Department(id)) => actor.belongs_to(id),
        Some(Holder::Level(level)) => actor.role == settings.role_for(*level),
        None => false,
    }
}

pub(crate) fn ensure_current_holder(
    case: &Case,
    actor: &Actor,
    action: Action,
    settings: &WorkflowSettings,
) -> Result<(), WorkflowError> {
    if is_current_holder(case, actor, settings) {
        return Ok(());
    }
    let reason = match case.current_holder() {
        Some(Holder::Department(id)) => format!("case is held by department {id}"),
        Some(Holder::Level(level)) => {
            format!("case awaits the {} ({level:?})", settings.role_for(*level))
        }
        None => "case has no current holder".to_string(),
    };
    Err(authorization_violation(actor, action, reason))
}

pub(crate) fn ensure_holder_or_administrator(
    case: &Case,
    actor: &Actor,
    action: Action,
    settings: &WorkflowSettings,
) -> Result<(), WorkflowError> {
    if actor.is_administrator() {
        return Ok(());
    }
    ensure_current_holder(case, actor, action, settings)
}

pub(crate) fn ensure_administrator(actor: &Actor, action: Action) -> Result<(), WorkflowError> {
    if actor.is_administrator() {
        Ok(())
    } else {
        Err(authorization_violation(actor, action, "administrator role required"))
    }
}

/// Requesters of routed cases must belong to a department
pub(crate) fn ensure_requester_department(actor: &Actor, action: Action) -> Result<(), WorkflowError> {
    if actor.department_id.is_some() || actor.is_administrator() {
        Ok(())
    } else {
        Err(authorization_violation(
            actor,
            action,
            "requester is not a member of any department",
        ))
    }
}

/// Optional remarks: blank becomes `None`, overlong is rejected
pub(crate) fn check_remarks(
    remarks: Option<String>,
    settings: &WorkflowSettings,
) -> Result<Option<String>, WorkflowError> {
    let Some(remarks) = remarks else {
        return Ok(None);
    };
    let trimmed = remarks.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > settings.remarks_max_len {
        return Err(WorkflowError::Validation(format!(
            "remarks exceed {} characters",
            settings.remarks_max_len
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Remarks that must be present
pub(crate) fn require_remarks(
    remarks: Option<String>,
    action: Action,
    settings: &WorkflowSettings,
) -> Result<String, WorkflowError> {
    check_remarks(remarks, settings)?
        .ok_or_else(|| WorkflowError::Validation(format!("remarks are required to {action}")))
}

/// An existing, active department
pub(crate) async fn ensure_active_department(
    repository: &dyn CaseRepository,
    target: Option<&DepartmentId>,
) -> Result<DepartmentId, WorkflowError> {
    let Some(target) = target else {
        return Err(WorkflowError::Validation(
            "target department is required".to_string(),
        ));
    };

    match repository.department(target).await? {
        Some(department) if department.is_active => Ok(department.id),
        Some(_) => Err(WorkflowError::Validation(format!(
            "department {target} is not active"
        ))),
        None => Err(WorkflowError::NotFound {
            entity: "department",
            id: target.to_string(),
        }),
    }
}

/// Department a case is handed to; must differ from the current holder
pub(crate) async fn ensure_target_department(
    repository: &dyn CaseRepository,
    case: &Case,
    target: Option<&DepartmentId>,
) -> Result<Holder, WorkflowError> {
    let target = ensure_active_department(repository, target).await?;
    if case.holding_department() == Some(&target) {
        return Err(WorkflowError::Validation(format!(
            "case is already held by department {target}"
        )));
    }
    Ok(Holder::Department(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{ApprovalLevel, ApprovalStatus, CasePayload, Department, Role, RoutedStatus, UserId};
    use crate::repository::MockCaseRepository;
    use chrono::Utc;

    fn routed_case(holder: &str) -> Case {
        Case::open(
            RoutedStatus::ToReceive.into(),
            Holder::department(holder),
            &UserId::from("clerk"),
            false,
            CasePayload::new("Memo"),
            Utc::now(),
        )
    }

    #[test]
    fn test_level_holder_matches_configured_role() {
        let case = Case::open(
            ApprovalStatus::Pending.into(),
            Holder::Level(ApprovalLevel::Level1),
            &UserId::from("clerk"),
            false,
            CasePayload::new("Leave"),
            Utc::now(),
        );
        let settings = WorkflowSettings::default();
        let dean = Actor::new("d1", Role::Dean, None);
        let president = Actor::new("p1", Role::President, None);

        assert!(is_current_holder(&case, &dean, &settings));
        assert!(!is_current_holder(&case, &president, &settings));

        let remapped = WorkflowSettings {
            level1_role: Role::President,
            level2_role: Role::Dean,
            ..Default::default()
        };
        assert!(is_current_holder(&case, &president, &remapped));
    }

    #[test]
    fn test_administrator_is_not_a_holder() {
        let case = routed_case("A");
        let admin = Actor::administrator("root");
        let settings = WorkflowSettings::default();

        assert!(ensure_current_holder(&case, &admin, Action::Receive, &settings).is_err());
        assert!(ensure_holder_or_administrator(&case, &admin, Action::Decline, &settings).is_ok());
    }

    #[test]
    fn test_remarks_trimmed_and_bounded() {
        let settings = WorkflowSettings {
            remarks_max_len: 5,
            ..Default::default()
        };
        assert_eq!(check_remarks(Some("  ok ".into()), &settings).unwrap(), Some("ok".into()));
        assert_eq!(check_remarks(Some("   ".into()), &settings).unwrap(), None);
        assert!(check_remarks(Some("too long".into()), &settings).is_err());
        assert!(require_remarks(None, Action::Decline, &settings).is_err());
        assert!(require_remarks(Some(" ".into()), Action::Reject, &settings).is_err());
    }

    #[test]
    fn test_illegal_action_reports_state_violation() {
        let case = routed_case("A");
        let err = ensure_legal(&case, Action::Complete).unwrap_err();
        assert!(matches!(err, WorkflowError::StateViolation { .. }));
    }

    #[tokio::test]
    async fn test_target_department_checks() {
        let mut repo = MockCaseRepository::new();
        repo.expect_department().returning(|id| {
            Ok(match id.as_str() {
                "A" | "B" => Some(Department::new(id.as_str(), id.as_str(), id.as_str())),
                "OLD" => Some(Department {
                    is_active: false,
                    ..Department::new("OLD", "Closed", "OLD")
                }),
                _ => None,
            })
        });
        let case = routed_case("A");

        let holder = ensure_target_department(&repo, &case, Some(&DepartmentId::from("B")))
            .await
            .unwrap();
        assert_eq!(holder, Holder::department("B"));

        let same = ensure_target_department(&repo, &case, Some(&DepartmentId::from("A"))).await;
        assert!(matches!(same, Err(WorkflowError::Validation(_))));

        let inactive = ensure_target_department(&repo, &case, Some(&DepartmentId::from("OLD"))).await;
        assert!(matches!(inactive, Err(WorkflowError::Validation(_))));

        let missing = ensure_target_department(&repo, &case, Some(&DepartmentId::from("ZZ"))).await;
        assert!(matches!(missing, Err(WorkflowError::NotFound { .. })));

        let absent = ensure_target_department(&repo, &case, None).await;
        assert!(matches!(absent, Err(WorkflowError::Validation(_))));
    }
}
