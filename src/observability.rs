use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::WorkflowError;

/// Transition counters for one workflow service
#[derive(Debug, Default)]
pub struct TransitionMetrics {
    pub committed: AtomicU64,
    pub state_violations: AtomicU64,
    pub authorization_violations: AtomicU64,
    pub conflicts: AtomicU64,
    pub validation_failures: AtomicU64,
    pub storage_failures: AtomicU64,
    pub not_found: AtomicU64,
    pub signatures_recorded: AtomicU64,
    pub notifications_dropped: AtomicU64,
}

impl TransitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_commit(&self, signature_recorded: bool) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        if signature_recorded {
            self.signatures_recorded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejection(&self, error: &WorkflowError) {
        let counter = match error {
            WorkflowError::StateViolation { .. } => &self.state_violations,
            WorkflowError::AuthorizationViolation { .. } => &self.authorization_violations,
            WorkflowError::ConcurrentModification { .. } => &self.conflicts,
            WorkflowError::Validation(_) => &self.validation_failures,
            WorkflowError::NotFound { .. } => &self.not_found,
            WorkflowError::Storage(_) => &self.storage_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
        warn!("Transition notification dropped");
    }

    pub fn get_stats(&self) -> TransitionStats {
        TransitionStats {
            committed: self.committed.load(Ordering::Relaxed),
            state_violations: self.state_violations.load(Ordering::Relaxed),
            authorization_violations: self.authorization_violations.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            signatures_recorded: self.signatures_recorded.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Transition metrics: committed={}, state_violations={}, authorization_violations={}, conflicts={}, validation_failures={}, notifications_dropped={}",
            stats.committed,
            stats.state_violations,
            stats.authorization_violations,
            stats.conflicts,
            stats.validation_failures,
            stats.notifications_dropped
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionStats {
    pub committed: u64,
    pub state_violations: u64,
    pub authorization_violations: u64,
    pub conflicts: u64,
    pub validation_failures: u64,
    pub storage_failures: u64,
    pub not_found: u64,
    pub signatures_recorded: u64,
    pub notifications_dropped: u64,
}

impl TransitionStats {
    pub fn rejected(&self) -> u64 {
        self.state_violations
            + self.authorization_violations
            + self.conflicts
            + self.validation_failures
            + self.storage_failures
            + self.not_found
    }
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
