use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::cases::{CaseId, CaseStatus, Holder, UserId};
use crate::errors::WorkflowError;
use crate::repository::CaseRepository;

/// Action label stored in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Received,
    Forwarded,
    Reviewed,
    Released,
    Escalated,
    Endorsed,
    Declined,
    Completed,
    Deleted,
    #[serde(rename = "APPROVED_LEVEL1")]
    ApprovedLevel1,
    #[serde(rename = "APPROVED_LEVEL2")]
    ApprovedLevel2,
    Rejected,
}

impl AuditAction {
    const ALL: [AuditAction; 13] = [
        AuditAction::Created,
        AuditAction::Received,
        AuditAction::Forwarded,
        AuditAction::Reviewed,
        AuditAction::Released,
        AuditAction::Escalated,
        AuditAction::Endorsed,
        AuditAction::Declined,
        AuditAction::Completed,
        AuditAction::Deleted,
        AuditAction::ApprovedLevel1,
        AuditAction::ApprovedLevel2,
        AuditAction::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "CREATED",
            AuditAction::Received => "RECEIVED",
            AuditAction::Forwarded => "FORWARDED",
            AuditAction::Reviewed => "REVIEWED",
            AuditAction::Released => "RELEASED",
            AuditAction::Escalated => "ESCALATED",
            AuditAction::Endorsed => "ENDORSED",
            AuditAction::Declined => "DECLINED",
            AuditAction::Completed => "COMPLETED",
            AuditAction::Deleted => "DELETED",
            AuditAction::ApprovedLevel1 => "APPROVED_LEVEL1",
            AuditAction::ApprovedLevel2 => "APPROVED_LEVEL2",
            AuditAction::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown audit action: {s}"))
    }
}

/// Log entry as handed to the repository, before it is assigned a sequence id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub case_id: CaseId,
    pub action: AuditAction,
    pub from_status: Option<CaseStatus>,
    pub to_status: CaseStatus,
    pub from_holder: Option<Holder>,
    pub to_holder: Option<Holder>,
    pub actor_id: UserId,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewLogEntry {
    pub fn into_entry(self, id: u64) -> LogEntry {
        LogEntry {
            id,
            case_id: self.case_id,
            action: self.action,
            from_status: self.from_status,
            to_status: self.to_status,
            from_holder: self.from_holder,
            to_holder: self.to_holder,
            actor_id: self.actor_id,
            remarks: self.remarks,
            created_at: self.created_at,
        }
    }
}

/// Committed, immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub case_id: CaseId,
    pub action: AuditAction,
    pub from_status: Option<CaseStatus>,
    pub to_status: CaseStatus,
    pub from_holder: Option<Holder>,
    pub to_holder: Option<Holder>,
    pub actor_id: UserId,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Read side of the audit log. Entries are only ever written as part of a
/// repository commit, so every one corresponds to a committed transition.
#[derive(Clone)]
pub struct AuditLog {
    repository: Arc<dyn CaseRepository>,
}

impl AuditLog {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }

    /// Full lifecycle of a case ordered by commit time then sequence.
    /// Tombstoned cases keep their history.
    pub async fn history_for(&self, case_id: CaseId) -> Result<Vec<LogEntry>, WorkflowError> {
        if self.repository.load_case(case_id).await?.is_none() {
            return Err(WorkflowError::case_not_found(case_id));
        }
        let mut entries = self.repository.history(case_id).await?;
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }
}
