use async_trait::async_trait;
use leasehold_core::AppResult;
use serde_json::Value;

/// Notification categories emitted by the approval engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A request awaits the owner's decision.
    ApprovalRequested,
    /// A request was approved or rejected.
    ApprovalDecided,
    /// A request passed its deadline undecided.
    ApprovalExpired,
}

impl NotificationKind {
    /// Returns a stable wire value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovalRequested => "approval.requested",
            Self::ApprovalDecided => "approval.decided",
            Self::ApprovalExpired => "approval.expired",
        }
    }
}

/// One message addressed to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Recipient subject.
    pub recipient_id: String,
    /// Message category.
    pub kind: NotificationKind,
    /// Structured message body.
    pub payload: Value,
}

/// Fire-and-forget notification port.
///
/// Implementations must return without waiting for delivery; the engine
/// logs and ignores errors.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Hands one notification to the delivery pipeline.
    async fn notify(&self, notification: Notification) -> AppResult<()>;
}
