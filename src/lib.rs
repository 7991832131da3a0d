// Docket Library - document routing and hierarchical approval workflows
// This exposes the core components for embedding, testing and the CLI

pub mod api;
pub mod cases;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod engines;
pub mod errors;
pub mod ledger;
pub mod notify;
pub mod observability;
pub mod repository;
pub mod service;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use api::{CreateCaseRequest, ErrorResponse, TransitionRequest, TransitionResponse, WorkflowApi};
pub use cases::{
    Actor, ApprovalLevel, ApprovalStatus, Case, CaseId, CaseKind, CasePayload, CaseStatus,
    Department, DepartmentId, Holder, Role, RoutedStatus, UserId,
};
pub use config::{DocketConfig, WorkflowSettings};
#[cfg(feature = "database")]
pub use database::SqliteCaseRepository;
pub use engines::{ApprovalEngine, RoutingEngine};
pub use errors::WorkflowError;
pub use ledger::{AuditAction, AuditLog, LogEntry, Signature, SignatureLedger};
pub use notify::{ChannelNotifier, LoggingNotifier, NoopNotifier, NotificationSink, TransitionNotice};
pub use observability::{OperationTimer, TransitionMetrics, TransitionStats};
pub use repository::{CaseFilter, CaseRepository, InMemoryCaseRepository, RepositoryError};
pub use service::{CaseView, NewCase, WorkflowService};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
pub use workflows::{Action, Transition, TransitionExecutor, TransitionOutcome, TransitionPlan};
