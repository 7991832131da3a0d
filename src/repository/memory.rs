use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::{CaseFilter, CaseRepository, CommitReceipt, RepositoryError, UnitOfWork};
use crate::cases::{Case, CaseId, Department, DepartmentId};
use crate::ledger::{LogEntry, NewLogEntry, Signature};

/// Everything stored for one case, guarded by that case's own lock
#[derive(Debug)]
struct CaseSlot {
    case: Case,
    log: Vec<LogEntry>,
    signatures: Vec<Signature>,
}

impl CaseSlot {
    fn snapshot(&self) -> Case {
        let mut case = self.case.clone();
        case.signatures = self.signatures.iter().map(|s| s.actor_id.clone()).collect();
        case
    }

    fn has_signed(&self, actor_id: &crate::cases::UserId) -> bool {
        self.signatures.iter().any(|s| &s.actor_id == actor_id)
    }
}

/// Process-local repository.
///
/// The outer map lock is only held long enough to find a case's slot; all
/// reads and writes of a case happen under that slot's mutex, so transitions
/// on different cases never wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryCaseRepository {
    cases: RwLock<HashMap<CaseId, Arc<Mutex<CaseSlot>>>>,
    departments: RwLock<HashMap<DepartmentId, Department>>,
    next_log_id: AtomicU64,
}

impl InMemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_departments(departments: impl IntoIterator<Item = Department>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.departments.write().await;
            for department in departments {
                map.insert(department.id.clone(), department);
            }
        }
        repo
    }

    async fn slot(&self, id: CaseId) -> Option<Arc<Mutex<CaseSlot>>> {
        self.cases.read().await.get(&id).cloned()
    }

    fn next_entry(&self, entry: NewLogEntry) -> LogEntry {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst) + 1;
        entry.into_entry(id)
    }
}

#[async_trait]
impl CaseRepository for InMemoryCaseRepository {
    async fn upsert_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.departments
            .write()
            .await
            .insert(department.id.clone(), department);
        Ok(())
    }

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        Ok(self.departments.read().await.get(id).cloned())
    }

    async fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        let mut all: Vec<Department> = self.departments.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn insert_case(&self, case: Case, entry: NewLogEntry) -> Result<LogEntry, RepositoryError> {
        let mut cases = self.cases.write().await;
        if cases.contains_key(&case.id) {
            return Err(RepositoryError::DuplicateCase(case.id));
        }

        let log_entry = self.next_entry(entry);
        let slot = CaseSlot {
            case,
            log: vec![log_entry.clone()],
            signatures: Vec::new(),
        };
        cases.insert(slot.case.id, Arc::new(Mutex::new(slot)));
        Ok(log_entry)
    }

    async fn load_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.snapshot())),
            None => Ok(None),
        }
    }

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, RepositoryError> {
        let slots: Vec<Arc<Mutex<CaseSlot>>> = self.cases.read().await.values().cloned().collect();

        let mut found = Vec::new();
        for slot in slots {
            let case = slot.lock().await.snapshot();
            if filter.matches(&case) {
                found.push(case);
            }
        }
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, RepositoryError> {
        let case_id = unit.case.id;
        let slot = self
            .slot(case_id)
            .await
            .ok_or(RepositoryError::CaseNotFound(case_id))?;
        let mut slot = slot.lock().await;

        if slot.case.version != unit.expected_version {
            return Err(RepositoryError::Conflict {
                case_id,
                expected: unit.expected_version,
                found: slot.case.version,
            });
        }

        // nothing below can fail, so the slot is never left half-written
        let mut case = unit.case;
        case.version = unit.expected_version + 1;

        let signature_recorded = match unit.signature {
            Some(request) if !slot.has_signed(&request.actor_id) => {
                slot.signatures.push(Signature {
                    case_id,
                    actor_id: request.actor_id,
                    signed_at: request.signed_at,
                });
                true
            }
            _ => false,
        };

        let log_entry = self.next_entry(unit.entry);
        slot.log.push(log_entry.clone());
        slot.case = case;

        Ok(CommitReceipt {
            case: slot.snapshot(),
            log_entry,
            signature_recorded,
        })
    }

    async fn insert_signature(&self, signature: Signature) -> Result<(), RepositoryError> {
        let slot = self
            .slot(signature.case_id)
            .await
            .ok_or(RepositoryError::CaseNotFound(signature.case_id))?;
        let mut slot = slot.lock().await;

        if slot.has_signed(&signature.actor_id) {
            return Err(RepositoryError::DuplicateSignature {
                case_id: signature.case_id,
                actor_id: signature.actor_id,
            });
        }
        slot.signatures.push(signature);
        Ok(())
    }

    async fn history(&self, id: CaseId) -> Result<Vec<LogEntry>, RepositoryError> {
        match self.slot(id).await {
            Some(slot) => Ok(slot.lock().await.log.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn signatures(&self, id: CaseId) -> Result<Vec<Signature>, RepositoryError> {
        match self.slot(id).await {
            Some(slot) => Ok(slot.lock().await.signatures.clone()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CasePayload, Holder, RoutedStatus, UserId};
    use crate::ledger::AuditAction;
    use crate::repository::SignatureRequest;
    use chrono::Utc;

    fn new_case() -> (Case, NewLogEntry) {
        let case = Case::open(
            RoutedStatus::ToReceive.into(),
            Holder::department("A"),
            &UserId::from("u1"),
            false,
            CasePayload::new("Memo"),
            Utc::now(),
        );
        let entry = NewLogEntry {
            case_id: case.id,
            action: AuditAction::Created,
            from_status: None,
            to_status: case.status,
            from_holder: None,
            to_holder: case.current_holder.clone(),
            actor_id: UserId::from("u1"),
            remarks: None,
            created_at: Utc::now(),
        };
        (case, entry)
    }

    fn receive_unit(case: &Case, expected_version: u64, signer: Option<&str>) -> UnitOfWork {
        let mut next = case.clone();
        next.advance(RoutedStatus::Ongoing.into(), case.current_holder.clone(), Utc::now());
        UnitOfWork {
            entry: NewLogEntry {
                case_id: case.id,
                action: AuditAction::Received,
                from_status: Some(case.status),
                to_status: next.status,
                from_holder: case.current_holder.clone(),
                to_holder: next.current_holder.clone(),
                actor_id: UserId::from("u1"),
                remarks: None,
                created_at: Utc::now(),
            },
            case: next,
            expected_version,
            signature: signer.map(|s| SignatureRequest {
                actor_id: UserId::from(s),
                signed_at: Utc::now(),
            }),
        }
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_appends_log() {
        let repo = InMemoryCaseRepository::new();
        let (case, entry) = new_case();
        repo.insert_case(case.clone(), entry).await.unwrap();

        let receipt = repo.commit(receive_unit(&case, 1, None)).await.unwrap();
        assert_eq!(receipt.case.version(), 2);
        assert_eq!(receipt.case.status(), RoutedStatus::Ongoing.into());
        assert_eq!(repo.history(case.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_commit_is_rejected_without_writes() {
        let repo = InMemoryCaseRepository::new();
        let (case, entry) = new_case();
        repo.insert_case(case.clone(), entry).await.unwrap();

        repo.commit(receive_unit(&case, 1, None)).await.unwrap();
        let err = repo.commit(receive_unit(&case, 1, Some("u9"))).await.unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::Conflict { expected: 1, found: 2, .. }
        ));
        assert_eq!(repo.history(case.id).await.unwrap().len(), 2);
        assert!(repo.signatures(case.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signature_in_commit_is_deduplicated() {
        let repo = InMemoryCaseRepository::new();
        let (case, entry) = new_case();
        repo.insert_case(case.clone(), entry).await.unwrap();

        let first = repo.commit(receive_unit(&case, 1, Some("dean"))).await.unwrap();
        assert!(first.signature_recorded);
        let second = repo
            .commit(receive_unit(&first.case, 2, Some("dean")))
            .await
            .unwrap();
        assert!(!second.signature_recorded);
        assert_eq!(second.case.signatures(), &[UserId::from("dean")]);
    }

    #[tokio::test]
    async fn test_insert_signature_reports_duplicates() {
        let repo = InMemoryCaseRepository::new();
        let (case, entry) = new_case();
        repo.insert_case(case.clone(), entry).await.unwrap();

        let signature = Signature {
            case_id: case.id,
            actor_id: UserId::from("dean"),
            signed_at: Utc::now(),
        };
        repo.insert_signature(signature.clone()).await.unwrap();
        let err = repo.insert_signature(signature).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateSignature { .. }));
        assert_eq!(repo.signatures(case.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_case_rejected() {
        let repo = InMemoryCaseRepository::new();
        let (case, entry) = new_case();
        repo.insert_case(case.clone(), entry.clone()).await.unwrap();
        let err = repo.insert_case(case, entry).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateCase(_)));
    }

    #[tokio::test]
    async fn test_commit_on_unknown_case() {
        let repo = InMemoryCaseRepository::new();
        let (case, _) = new_case();
        let err = repo.commit(receive_unit(&case, 1, None)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::CaseNotFound(_)));
    }

    #[tokio::test]
    async fn test_departments_sorted() {
        let repo = InMemoryCaseRepository::with_departments([
            Department::new("REG", "Registrar", "REG"),
            Department::new("ACC", "Accounting", "ACC"),
        ])
        .await;
        let ids: Vec<String> = repo
            .departments()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.0)
            .collect();
        assert_eq!(ids, vec!["ACC", "REG"]);
    }
}
