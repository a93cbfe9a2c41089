use leasehold_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Actor id recorded for transitions made by the scheduler.
pub const SYSTEM_ACTOR_ID: &str = "system";

/// Stable audit actions emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A permission or scope check denied an action.
    AccessDenied,
    /// An approval request was opened.
    ApprovalRequestCreated,
    /// An approval request was approved.
    ApprovalRequestApproved,
    /// An approval request was rejected.
    ApprovalRequestRejected,
    /// An approval request passed its deadline.
    ApprovalRequestExpired,
    /// A managing relationship started.
    RelationshipStarted,
    /// A managing relationship ended.
    RelationshipEnded,
    /// A role was assigned to a subject.
    RoleAssigned,
    /// A role assignment was deactivated.
    RoleAssignmentDeactivated,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "security.access.denied",
            Self::ApprovalRequestCreated => "approval.request.created",
            Self::ApprovalRequestApproved => "approval.request.approved",
            Self::ApprovalRequestRejected => "approval.request.rejected",
            Self::ApprovalRequestExpired => "approval.request.expired",
            Self::RelationshipStarted => "relationship.started",
            Self::RelationshipEnded => "relationship.ended",
            Self::RoleAssigned => "security.role.assigned",
            Self::RoleAssignmentDeactivated => "security.role.deactivated",
        }
    }

    /// Parses a stored action value.
    pub fn parse(value: &str) -> AppResult<Self> {
        [
            Self::AccessDenied,
            Self::ApprovalRequestCreated,
            Self::ApprovalRequestApproved,
            Self::ApprovalRequestRejected,
            Self::ApprovalRequestExpired,
            Self::RelationshipStarted,
            Self::RelationshipEnded,
            Self::RoleAssigned,
            Self::RoleAssignmentDeactivated,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
        .ok_or_else(|| AppError::Validation(format!("unknown audit action '{value}'")))
    }

    /// Audit action recorded for a request entering `status`.
    #[must_use]
    pub fn for_approval_status(status: crate::ApprovalStatus) -> Self {
        match status {
            crate::ApprovalStatus::Pending => Self::ApprovalRequestCreated,
            crate::ApprovalStatus::Approved => Self::ApprovalRequestApproved,
            crate::ApprovalStatus::Rejected => Self::ApprovalRequestRejected,
            crate::ApprovalStatus::Expired => Self::ApprovalRequestExpired,
        }
    }
}
