// Two actors racing on the same case: exactly one transition commits

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

use docket::ledger::NewLogEntry;
use docket::repository::{CommitReceipt, UnitOfWork};
use docket::{
    Action, Actor, ApprovalStatus, Case, CaseId, CasePayload, CaseRepository, Department,
    DepartmentId, InMemoryCaseRepository, LogEntry, NewCase, NoopNotifier, RepositoryError, Role,
    Signature, WorkflowError, WorkflowService, WorkflowSettings,
};

/// Holds every armed `load_case` until both racers have read the same
/// version of the case.
struct RendezvousRepository {
    inner: InMemoryCaseRepository,
    armed: AtomicBool,
    barrier: Barrier,
}

impl RendezvousRepository {
    fn new(inner: InMemoryCaseRepository) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            barrier: Barrier::new(2),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl CaseRepository for RendezvousRepository {
    async fn upsert_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.inner.upsert_department(department).await
    }

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        self.inner.department(id).await
    }

    async fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        self.inner.departments().await
    }

    async fn insert_case(&self, case: Case, entry: NewLogEntry) -> Result<LogEntry, RepositoryError> {
        self.inner.insert_case(case, entry).await
    }

    async fn load_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError> {
        let case = self.inner.load_case(id).await?;
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait().await;
        }
        Ok(case)
    }

    async fn list_cases(&self, filter: &docket::CaseFilter) -> Result<Vec<Case>, RepositoryError> {
        self.inner.list_cases(filter).await
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, RepositoryError> {
        self.inner.commit(unit).await
    }

    async fn insert_signature(&self, signature: Signature) -> Result<(), RepositoryError> {
        self.inner.insert_signature(signature).await
    }

    async fn history(&self, id: CaseId) -> Result<Vec<LogEntry>, RepositoryError> {
        self.inner.history(id).await
    }

    async fn signatures(&self, id: CaseId) -> Result<Vec<Signature>, RepositoryError> {
        self.inner.signatures(id).await
    }
}

fn service_over(repository: Arc<RendezvousRepository>) -> WorkflowService {
    WorkflowService::new(repository, Arc::new(NoopNotifier), WorkflowSettings::default())
}

#[tokio::test]
async fn test_approve_and_reject_race_commits_once() {
    let repository = Arc::new(RendezvousRepository::new(InMemoryCaseRepository::new()));
    let service = service_over(repository.clone());

    let case_id = service
        .create_case(&Actor::staff("requester", "HR"), NewCase::hierarchical(CasePayload::new("Leave")))
        .await
        .unwrap()
        .case
        .id();

    let dean_one = Actor::new("dean-one", Role::Dean, None);
    let dean_two = Actor::new("dean-two", Role::Dean, None);
    repository.arm();

    let (approved, rejected) = tokio::join!(
        service.dispatch(case_id, Action::ApproveLevel1, &dean_one, None, None),
        service.dispatch(case_id, Action::Reject, &dean_two, None, Some("duplicate".into())),
    );
    repository.disarm();

    let results = [approved.map(|o| o.case.status()), rejected.map(|o| o.case.status())];
    let committed: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    let conflicts: Vec<_> = results
        .iter()
        .filter(|r| matches!(r, Err(WorkflowError::ConcurrentModification { .. })))
        .collect();
    assert_eq!(committed.len(), 1, "exactly one racer commits: {results:?}");
    assert_eq!(conflicts.len(), 1, "the loser sees a conflict: {results:?}");

    // one CREATED entry plus the winner's entry
    let history = service.history_for(case_id).await.unwrap();
    assert_eq!(history.len(), 2);

    let stats = service.stats();
    assert_eq!(stats.conflicts, 1);

    let view = service.case_view(case_id, false).await.unwrap();
    assert!(
        view.status == ApprovalStatus::ApprovedLevel1.into() || view.status == ApprovalStatus::Rejected.into()
    );
    assert_eq!(view.version, 2);
}

#[tokio::test]
async fn test_conflict_is_retryable_and_retry_sees_new_state() {
    let repository = Arc::new(RendezvousRepository::new(InMemoryCaseRepository::new()));
    let service = service_over(repository.clone());

    let case_id = service
        .create_case(&Actor::staff("requester", "HR"), NewCase::hierarchical(CasePayload::new("Leave")))
        .await
        .unwrap()
        .case
        .id();

    let dean_one = Actor::new("dean-one", Role::Dean, None);
    let dean_two = Actor::new("dean-two", Role::Dean, None);
    repository.arm();

    let (first, second) = tokio::join!(
        service.dispatch(case_id, Action::ApproveLevel1, &dean_one, None, None),
        service.dispatch(case_id, Action::ApproveLevel1, &dean_two, None, None),
    );
    repository.disarm();
    let loser = match (first, second) {
        (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
        other => panic!("expected one winner, got {other:?}"),
    };
    assert!(loser.is_retryable());

    // a retry re-reads the case and is judged against the new status
    let err = service
        .dispatch(case_id, Action::ApproveLevel1, &dean_two, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateViolation { .. }));
    assert_eq!(service.signatures_for(case_id).await.unwrap().len(), 1);
}
