//! Post-commit notification hook.
//!
//! Sinks are told about every committed transition at most once. Delivery is
//! best-effort: a sink error is logged and counted by the caller, never
//! propagated back into the transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::cases::{CaseId, CaseStatus, UserId};
use crate::ledger::AuditAction;

/// What a sink learns about a committed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionNotice {
    pub case_id: CaseId,
    pub action: AuditAction,
    pub new_status: CaseStatus,
    pub actor_id: UserId,
    pub timestamp: DateTime<Utc>,
}

/// Receiver of transition notices. Implementations must not block; the
/// executor calls `notify` inline right after the commit.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: &TransitionNotice) -> anyhow::Result<()>;
}

/// Discards every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _notice: &TransitionNotice) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emits each notice as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl NotificationSink for LoggingNotifier {
    fn notify(&self, notice: &TransitionNotice) -> anyhow::Result<()> {
        info!(
            case_id = %notice.case_id,
            action = %notice.action,
            new_status = %notice.new_status,
            actor = %notice.actor_id,
            timestamp = %notice.timestamp,
            "Case transition"
        );
        Ok(())
    }
}

/// Forwards notices into a bounded channel. A full or closed channel drops
/// the notice and reports an error.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<TransitionNotice>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::Sender<TransitionNotice>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end of a fresh channel of `capacity`
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransitionNotice>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notice: &TransitionNotice) -> anyhow::Result<()> {
        self.sender.try_send(notice.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                anyhow::anyhow!("notification buffer full, dropped notice for case {}", notice.case_id)
            }
            mpsc::error::TrySendError::Closed(_) => {
                anyhow::anyhow!("notification receiver closed, dropped notice for case {}", notice.case_id)
            }
        })
    }
}
