//! Application services and ports.

#![forbid(unsafe_code)]

mod approval_ports;
mod approval_service;
mod audit_ports;
mod audit_service;
mod authorization_ports;
mod clock;
mod deadline;
mod notification_ports;
mod permission_checker;
mod policy;
mod relationship_service;
mod role_assignment_service;
mod scope_resolver;

#[cfg(test)]
mod test_support;

pub use approval_ports::{
    ApprovalRequestQuery, ApprovalRequestRepository, BulkDecisionFailure, BulkDecisionResult,
    CreateApprovalRequestInput,
};
pub use approval_service::ApprovalService;
pub use audit_ports::{AuditEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
pub use audit_service::{AuditLogger, AuditQueryService};
pub use authorization_ports::{
    PermissionContextCache, RelationshipRepository, RoleAssignmentRepository,
};
pub use clock::Clock;
pub use notification_ports::{Notification, NotificationKind, NotificationPublisher};
pub use permission_checker::{PermissionCheck, PermissionChecker};
pub use policy::{ApprovalPolicy, AuditFailurePolicy};
pub use relationship_service::RelationshipService;
pub use role_assignment_service::{AssignRoleInput, RoleAssignmentService};
pub use scope_resolver::ScopeResolver;
