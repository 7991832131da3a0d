// Case records and the identities that act on them

pub mod payload;
pub mod types;

pub use payload::{AttachmentRef, CasePayload, CURRENT_PAYLOAD_VERSION};
pub use types::{
    Actor, ApprovalLevel, ApprovalStatus, Case, CaseId, CaseKind, CaseStatus, Department,
    DepartmentId, Holder, Role, RoutedStatus, UserId,
};
