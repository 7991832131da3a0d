// Routed-document workflow through the public service API

use docket::{
    Action, Actor, AuditAction, CaseFilter, CaseKind, CasePayload, Department, DepartmentId,
    Holder, NewCase, Role, RoutedStatus, UserId, WorkflowError, WorkflowService,
};

async fn service_with_departments() -> WorkflowService {
    let service = WorkflowService::in_memory();
    for (id, name) in [("A", "Admissions"), ("B", "Budget"), ("C", "Compliance")] {
        service
            .register_department(Department::new(id, name, id))
            .await
            .unwrap();
    }
    let mut closed = Department::new("X", "Archive", "ARC");
    closed.is_active = false;
    service.register_department(closed).await.unwrap();
    service
}

fn dept(id: &str) -> DepartmentId {
    DepartmentId::from(id)
}

#[tokio::test]
async fn test_receive_then_forward_hands_case_to_next_department() {
    let service = service_with_departments().await;
    let clerk_a = Actor::staff("alice", "A");

    let created = service
        .create_case(&clerk_a, NewCase::routed("A", CasePayload::new("Travel request")))
        .await
        .unwrap();
    assert_eq!(created.case.status(), RoutedStatus::ToReceive.into());
    assert_eq!(created.case.current_holder(), Some(&Holder::department("A")));
    assert_eq!(created.log_entry.action, AuditAction::Created);

    let case_id = created.case.id();
    let received = service
        .dispatch(case_id, Action::Receive, &clerk_a, None, None)
        .await
        .unwrap();
    assert_eq!(received.case.status(), RoutedStatus::Ongoing.into());

    let forwarded = service
        .dispatch(case_id, Action::Forward, &clerk_a, Some(&dept("B")), None)
        .await
        .unwrap();
    assert_eq!(forwarded.case.status(), RoutedStatus::ToRelease.into());
    assert_eq!(forwarded.case.current_holder(), Some(&Holder::department("B")));

    // A no longer holds it
    let err = service
        .dispatch(case_id, Action::Forward, &clerk_a, Some(&dept("C")), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationViolation { .. }));

    let clerk_b = Actor::staff("bob", "B");
    let reviewed = service
        .dispatch(case_id, Action::Forward, &clerk_b, Some(&dept("C")), Some("final".into()))
        .await
        .unwrap();
    assert_eq!(reviewed.case.status(), RoutedStatus::Reviewed.into());
    assert_eq!(reviewed.case.current_holder(), Some(&Holder::department("C")));
    assert_eq!(reviewed.case.last_holder(), Some(&Holder::department("B")));

    let clerk_c = Actor::staff("carol", "C");
    let completed = service
        .dispatch(case_id, Action::Complete, &clerk_c, None, None)
        .await
        .unwrap();
    assert_eq!(completed.case.status(), RoutedStatus::Completed.into());
    assert_eq!(completed.case.current_holder(), None);
    assert!(!completed.signature_recorded);

    let history = service.history_for(case_id).await.unwrap();
    let actions: Vec<AuditAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Created,
            AuditAction::Received,
            AuditAction::Forwarded,
            AuditAction::Forwarded,
            AuditAction::Completed,
        ]
    );
    assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn test_release_returns_case_to_receive_state() {
    let service = service_with_departments().await;
    let clerk_a = Actor::staff("alice", "A");
    let clerk_b = Actor::staff("bob", "B");

    let case_id = service
        .create_case(&clerk_a, NewCase::routed("A", CasePayload::new("Memo")))
        .await
        .unwrap()
        .case
        .id();
    service.dispatch(case_id, Action::Receive, &clerk_a, None, None).await.unwrap();
    service
        .dispatch(case_id, Action::Forward, &clerk_a, Some(&dept("B")), None)
        .await
        .unwrap();

    let released = service
        .dispatch(case_id, Action::Release, &clerk_b, Some(&dept("C")), None)
        .await
        .unwrap();
    assert_eq!(released.case.status(), RoutedStatus::ToReceive.into());
    assert_eq!(released.case.current_holder(), Some(&Holder::department("C")));
    assert_eq!(released.log_entry.action, AuditAction::Released);
}

#[tokio::test]
async fn test_forward_target_checks() {
    let service = service_with_departments().await;
    let clerk_a = Actor::staff("alice", "A");
    let case_id = service
        .create_case(&clerk_a, NewCase::routed("A", CasePayload::new("Memo")))
        .await
        .unwrap()
        .case
        .id();
    service.dispatch(case_id, Action::Receive, &clerk_a, None, None).await.unwrap();

    let missing = service
        .dispatch(case_id, Action::Forward, &clerk_a, None, None)
        .await
        .unwrap_err();
    assert!(matches!(missing, WorkflowError::Validation(_)));

    let unknown = service
        .dispatch(case_id, Action::Forward, &clerk_a, Some(&dept("Z")), None)
        .await
        .unwrap_err();
    assert!(matches!(unknown, WorkflowError::NotFound { .. }));

    let inactive = service
        .dispatch(case_id, Action::Forward, &clerk_a, Some(&dept("X")), None)
        .await
        .unwrap_err();
    assert!(matches!(inactive, WorkflowError::Validation(_)));

    let same = service
        .dispatch(case_id, Action::Forward, &clerk_a, Some(&dept("A")), None)
        .await
        .unwrap_err();
    assert!(matches!(same, WorkflowError::Validation(_)));

    // nothing was committed by the failed attempts
    assert_eq!(service.history_for(case_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_escalated_case_runs_through_dean_and_president() {
    let service = service_with_departments().await;
    let clerk = Actor::staff("alice", "A");
    let dean = Actor::new("dean", Role::Dean, None);
    let president = Actor::new("president", Role::President, None);

    let case_id = service
        .create_case(&clerk, NewCase::routed("A", CasePayload::new("Budget")).escalated())
        .await
        .unwrap()
        .case
        .id();
    for action in [Action::Receive, Action::Review, Action::Escalate] {
        service.dispatch(case_id, action, &clerk, None, None).await.unwrap();
    }

    let view = service.case_view(case_id, false).await.unwrap();
    assert!(view.in_dean);
    assert!(!view.in_president);
    assert_eq!(view.current_holder, Some(Holder::Level(docket::ApprovalLevel::Level1)));

    service.dispatch(case_id, Action::Endorse, &dean, None, None).await.unwrap();
    let view = service.case_view(case_id, false).await.unwrap();
    assert!(view.in_president);
    assert!(view.has_dean_signature);
    assert!(!view.has_president_signature);

    service
        .dispatch(case_id, Action::Complete, &president, None, Some("approved".into()))
        .await
        .unwrap();
    let view = service.case_view(case_id, false).await.unwrap();
    assert_eq!(view.status, RoutedStatus::Completed.into());
    assert!(view.has_president_signature);
    assert!(view.legal_actions.is_empty());

    let signers: Vec<UserId> = service
        .signatures_for(case_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.actor_id)
        .collect();
    assert_eq!(signers, vec![UserId::from("alice"), UserId::from("dean"), UserId::from("president")]);
}

#[tokio::test]
async fn test_decline_of_escalated_case() {
    let service = service_with_departments().await;
    let clerk = Actor::staff("alice", "A");
    let case_id = service
        .create_case(&clerk, NewCase::routed("A", CasePayload::new("Budget")).escalated())
        .await
        .unwrap()
        .case
        .id();
    for action in [Action::Receive, Action::Review, Action::Escalate] {
        service.dispatch(case_id, action, &clerk, None, None).await.unwrap();
    }

    let err = service
        .dispatch(case_id, Action::Decline, &clerk, None, Some("withdrawn".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationViolation { .. }));

    let dean = Actor::new("dean", Role::Dean, None);
    let err = service
        .dispatch(case_id, Action::Decline, &dean, None, Some("   ".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let declined = service
        .dispatch(case_id, Action::Decline, &dean, None, Some("out of budget".into()))
        .await
        .unwrap();
    assert_eq!(declined.case.status(), RoutedStatus::Declined.into());
    assert_eq!(declined.case.current_holder(), None);
    assert_eq!(declined.log_entry.remarks.as_deref(), Some("out of budget"));

    // terminal
    let err = service
        .dispatch(case_id, Action::Complete, &Actor::new("president", Role::President, None), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateViolation { .. }));
}

#[tokio::test]
async fn test_soft_delete_hides_case_but_keeps_history() {
    let service = service_with_departments().await;
    let clerk = Actor::staff("alice", "A");
    let case_id = service
        .create_case(&clerk, NewCase::routed("A", CasePayload::new("Memo")))
        .await
        .unwrap()
        .case
        .id();

    let err = service
        .dispatch(case_id, Action::Delete, &clerk, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationViolation { .. }));

    let deleted = service
        .dispatch(case_id, Action::Delete, &Actor::administrator("root"), None, Some("duplicate".into()))
        .await
        .unwrap();
    assert_eq!(deleted.case.status(), RoutedStatus::Deleted.into());
    assert!(deleted.case.deleted_at().is_some());

    let visible = service
        .list_cases(&CaseFilter {
            kind: Some(CaseKind::Routed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(visible.is_empty());

    let all = service
        .list_cases(&CaseFilter {
            include_deleted: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let err = service
        .dispatch(case_id, Action::Receive, &clerk, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateViolation { .. }));

    let history = service.history_for(case_id).await.unwrap();
    assert_eq!(history.last().map(|e| e.action), Some(AuditAction::Deleted));
}

#[tokio::test]
async fn test_unknown_case_is_not_found() {
    let service = service_with_departments().await;
    let err = service
        .dispatch(docket::CaseId::new(), Action::Receive, &Actor::staff("alice", "A"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
}
