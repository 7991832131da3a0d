// Core types for cases under workflow control

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::payload::CasePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub Uuid);

impl CaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(CaseId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub String);

impl DepartmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DepartmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow style a case follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseKind {
    /// Sequential handoff between departments
    Routed,
    /// Two-level executive sign-off
    Hierarchical,
}

impl CaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseKind::Routed => "ROUTED",
            CaseKind::Hierarchical => "HIERARCHICAL",
        }
    }
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ROUTED" => Ok(CaseKind::Routed),
            "HIERARCHICAL" => Ok(CaseKind::Hierarchical),
            other => Err(format!("unknown case kind: {other}")),
        }
    }
}

/// States of a routed-document case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutedStatus {
    ToReceive,
    Ongoing,
    ToRelease,
    Reviewed,
    SentToDean,
    SentToPresident,
    Completed,
    Declined,
    Deleted,
}

impl RoutedStatus {
    pub const ALL: [RoutedStatus; 9] = [
        RoutedStatus::ToReceive,
        RoutedStatus::Ongoing,
        RoutedStatus::ToRelease,
        RoutedStatus::Reviewed,
        RoutedStatus::SentToDean,
        RoutedStatus::SentToPresident,
        RoutedStatus::Completed,
        RoutedStatus::Declined,
        RoutedStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutedStatus::ToReceive => "TO_RECEIVE",
            RoutedStatus::Ongoing => "ONGOING",
            RoutedStatus::ToRelease => "TO_RELEASE",
            RoutedStatus::Reviewed => "REVIEWED",
            RoutedStatus::SentToDean => "SENT_TO_DEAN",
            RoutedStatus::SentToPresident => "SENT_TO_PRESIDENT",
            RoutedStatus::Completed => "COMPLETED",
            RoutedStatus::Declined => "DECLINED",
            RoutedStatus::Deleted => "DELETED",
        }
    }
}

/// States of a hierarchical-approval case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    #[serde(rename = "APPROVED_LEVEL1")]
    ApprovedLevel1,
    #[serde(rename = "APPROVED_LEVEL2")]
    ApprovedLevel2,
    Rejected,
}

impl ApprovalStatus {
    pub const ALL: [ApprovalStatus; 4] = [
        ApprovalStatus::Pending,
        ApprovalStatus::ApprovedLevel1,
        ApprovalStatus::ApprovedLevel2,
        ApprovalStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::ApprovedLevel1 => "APPROVED_LEVEL1",
            ApprovalStatus::ApprovedLevel2 => "APPROVED_LEVEL2",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

/// Status of a case. The variant fixes the kind, so a status can never belong
/// to the wrong state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseStatus {
    Routed(RoutedStatus),
    Hierarchical(ApprovalStatus),
}

impl CaseStatus {
    pub fn kind(&self) -> CaseKind {
        match self {
            CaseStatus::Routed(_) => CaseKind::Routed,
            CaseStatus::Hierarchical(_) => CaseKind::Hierarchical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Routed(status) => status.as_str(),
            CaseStatus::Hierarchical(status) => status.as_str(),
        }
    }

    /// Parse a stored status name within the state set of `kind`
    pub fn parse(kind: CaseKind, value: &str) -> Option<Self> {
        match kind {
            CaseKind::Routed => RoutedStatus::ALL
                .iter()
                .find(|s| s.as_str() == value)
                .map(|s| CaseStatus::Routed(*s)),
            CaseKind::Hierarchical => ApprovalStatus::ALL
                .iter()
                .find(|s| s.as_str() == value)
                .map(|s| CaseStatus::Hierarchical(*s)),
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RoutedStatus> for CaseStatus {
    fn from(value: RoutedStatus) -> Self {
        CaseStatus::Routed(value)
    }
}

impl From<ApprovalStatus> for CaseStatus {
    fn from(value: ApprovalStatus) -> Self {
        CaseStatus::Hierarchical(value)
    }
}

/// Executive approval levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalLevel {
    #[serde(rename = "LEVEL1")]
    Level1,
    #[serde(rename = "LEVEL2")]
    Level2,
}

impl ApprovalLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalLevel::Level1 => "LEVEL1",
            ApprovalLevel::Level2 => "LEVEL2",
        }
    }
}

/// Who is currently responsible for acting on a case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Holder {
    Department(DepartmentId),
    Level(ApprovalLevel),
}

const DEPARTMENT_PREFIX: &str = "dept:";

impl Holder {
    pub fn department(id: impl Into<String>) -> Self {
        Holder::Department(DepartmentId(id.into()))
    }

    /// Compact form used by storage backends
    pub fn encode(&self) -> String {
        match self {
            Holder::Department(id) => format!("{DEPARTMENT_PREFIX}{id}"),
            Holder::Level(level) => level.as_str().to_string(),
        }
    }

    pub fn decode(value: &str) -> Option<Self> {
        if let Some(id) = value.strip_prefix(DEPARTMENT_PREFIX) {
            return (!id.is_empty()).then(|| Holder::department(id));
        }
        match value {
            "LEVEL1" => Some(Holder::Level(ApprovalLevel::Level1)),
            "LEVEL2" => Some(Holder::Level(ApprovalLevel::Level2)),
            _ => None,
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Administrator,
    Dean,
    President,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Administrator => "administrator",
            Role::Dean => "dean",
            Role::President => "president",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "staff" => Ok(Role::Staff),
            "administrator" | "admin" => Ok(Role::Administrator),
            "dean" => Ok(Role::Dean),
            "president" => Ok(Role::President),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Authenticated identity supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, department_id: Option<DepartmentId>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
            department_id,
        }
    }

    pub fn staff(user_id: impl Into<String>, department: impl Into<String>) -> Self {
        Self::new(user_id, Role::Staff, Some(DepartmentId(department.into())))
    }

    pub fn administrator(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Administrator, None)
    }

    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }

    pub fn belongs_to(&self, department: &DepartmentId) -> bool {
        self.department_id.as_ref() == Some(department)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub code: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Department {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: DepartmentId(id.into()),
            name: name.into(),
            code: code.into(),
            is_active: true,
        }
    }
}

/// A case under workflow control.
///
/// Fields are only written by the transition executor and the storage
/// backends; callers read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub(crate) id: CaseId,
    pub(crate) status: CaseStatus,
    pub(crate) current_holder: Option<Holder>,
    pub(crate) last_holder: Option<Holder>,
    pub(crate) created_by: UserId,
    pub(crate) requester_id: UserId,
    pub(crate) requires_escalation: bool,
    pub(crate) payload: CasePayload,
    pub(crate) signatures: Vec<UserId>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) deleted_at: Option<DateTime<Utc>>,
    pub(crate) version: u64,
}

impl Case {
    pub(crate) fn open(
        status: CaseStatus,
        holder: Holder,
        requester: &UserId,
        requires_escalation: bool,
        payload: CasePayload,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CaseId::new(),
            status,
            current_holder: Some(holder),
            last_holder: None,
            created_by: requester.clone(),
            requester_id: requester.clone(),
            requires_escalation,
            payload,
            signatures: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 1,
        }
    }

    /// Move to `status` with `holder`, remembering the previous holder when it changes
    pub(crate) fn advance(&mut self, status: CaseStatus, holder: Option<Holder>, now: DateTime<Utc>) {
        if holder != self.current_holder {
            self.last_holder = self.current_holder.take();
        }
        self.current_holder = holder;
        self.status = status;
        self.updated_at = now;
    }

    pub fn id(&self) -> CaseId {
        self.id
    }

    pub fn kind(&self) -> CaseKind {
        self.status.kind()
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn current_holder(&self) -> Option<&Holder> {
        self.current_holder.as_ref()
    }

    pub fn last_holder(&self) -> Option<&Holder> {
        self.last_holder.as_ref()
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn requester_id(&self) -> &UserId {
        &self.requester_id
    }

    pub fn requires_escalation(&self) -> bool {
        self.requires_escalation
    }

    pub fn payload(&self) -> &CasePayload {
        &self.payload
    }

    pub fn signatures(&self) -> &[UserId] {
        &self.signatures
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn holding_department(&self) -> Option<&DepartmentId> {
        match &self.current_holder {
            Some(Holder::Department(id)) => Some(id),
            _ => None,
        }
    }

    /// Awaiting the level-1 signature (hierarchical cases)
    pub fn awaiting_level1(&self) -> bool {
        self.status == CaseStatus::Hierarchical(ApprovalStatus::Pending)
    }

    /// Awaiting the level-2 signature (hierarchical cases)
    pub fn awaiting_level2(&self) -> bool {
        self.status == CaseStatus::Hierarchical(ApprovalStatus::ApprovedLevel1)
    }

    pub fn level1_signed(&self) -> bool {
        match self.status {
            CaseStatus::Hierarchical(ApprovalStatus::ApprovedLevel1)
            | CaseStatus::Hierarchical(ApprovalStatus::ApprovedLevel2) => true,
            CaseStatus::Hierarchical(ApprovalStatus::Rejected) => {
                self.last_holder == Some(Holder::Level(ApprovalLevel::Level2))
            }
            _ => false,
        }
    }

    pub fn level2_signed(&self) -> bool {
        self.status == CaseStatus::Hierarchical(ApprovalStatus::ApprovedLevel2)
    }

    /// Escalated case currently waiting on the dean
    pub fn in_dean(&self) -> bool {
        self.status == CaseStatus::Routed(RoutedStatus::SentToDean)
    }

    /// Escalated case currently waiting on the president
    pub fn in_president(&self) -> bool {
        self.status == CaseStatus::Routed(RoutedStatus::SentToPresident)
    }

    pub fn has_dean_signature(&self) -> bool {
        match self.status {
            CaseStatus::Routed(RoutedStatus::SentToPresident) => true,
            CaseStatus::Routed(RoutedStatus::Completed) => self.requires_escalation,
            CaseStatus::Routed(RoutedStatus::Declined) | CaseStatus::Routed(RoutedStatus::Deleted) => {
                self.last_holder == Some(Holder::Level(ApprovalLevel::Level2))
            }
            _ => false,
        }
    }

    pub fn has_president_signature(&self) -> bool {
        self.status == CaseStatus::Routed(RoutedStatus::Completed) && self.requires_escalation
    }
}
