//! Case repository abstraction.
//!
//! The workflow core is generic over storage. An implementation must apply a
//! [`UnitOfWork`] atomically: the case write, the log entry and the optional
//! signature either all land or none do, and the write only succeeds when the
//! stored version still equals `expected_version`.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::cases::{Case, CaseId, CaseKind, CaseStatus, Department, DepartmentId, Holder, UserId};
use crate::ledger::{LogEntry, NewLogEntry, Signature};

pub use memory::InMemoryCaseRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("case {0} not found")]
    CaseNotFound(CaseId),

    #[error("case {0} already exists")]
    DuplicateCase(CaseId),

    #[error("version conflict on case {case_id}: expected {expected}, found {found}")]
    Conflict {
        case_id: CaseId,
        expected: u64,
        found: u64,
    },

    #[error("{actor_id} already signed case {case_id}")]
    DuplicateSignature { case_id: CaseId, actor_id: UserId },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Signature written as part of a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequest {
    pub actor_id: UserId,
    pub signed_at: DateTime<Utc>,
}

/// Everything one transition writes
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    /// Case in its post-transition state
    pub case: Case,
    /// Version the transition was validated against
    pub expected_version: u64,
    pub entry: NewLogEntry,
    pub signature: Option<SignatureRequest>,
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Case as stored, with its new version and signature projection
    pub case: Case,
    pub log_entry: LogEntry,
    pub signature_recorded: bool,
}

/// Query filter for listing cases
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilter {
    pub kind: Option<CaseKind>,
    pub status: Option<CaseStatus>,
    pub holder: Option<Holder>,
    pub include_deleted: bool,
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        if !self.include_deleted && case.is_deleted() {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != case.kind()) {
            return false;
        }
        if self.status.is_some_and(|status| status != case.status()) {
            return false;
        }
        if let Some(holder) = &self.holder {
            if case.current_holder() != Some(holder) {
                return false;
            }
        }
        true
    }
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Insert or replace a department record
    async fn upsert_department(&self, department: Department) -> Result<(), RepositoryError>;

    async fn department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError>;

    async fn departments(&self) -> Result<Vec<Department>, RepositoryError>;

    /// Store a new case together with its CREATED log entry
    async fn insert_case(&self, case: Case, entry: NewLogEntry) -> Result<LogEntry, RepositoryError>;

    /// Load a case including tombstoned ones
    async fn load_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError>;

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, RepositoryError>;

    /// Atomic compare-and-set of one transition
    async fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, RepositoryError>;

    /// Add a signature outside a transition. Fails with
    /// [`RepositoryError::DuplicateSignature`] when the pair already exists.
    async fn insert_signature(&self, signature: Signature) -> Result<(), RepositoryError>;

    async fn history(&self, id: CaseId) -> Result<Vec<LogEntry>, RepositoryError>;

    async fn signatures(&self, id: CaseId) -> Result<Vec<Signature>, RepositoryError>;
}
