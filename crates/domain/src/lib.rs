//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod approval;
mod audit;
mod permission;
mod permission_matrix;
mod role;
mod scope;

pub use approval::{
    ApprovalDecision, ApprovalRequest, ApprovalRequestDraft, ApprovalRequestId, ApprovalStatus,
    ApprovalTransition, ApprovalType,
};
pub use audit::{AuditAction, SYSTEM_ACTOR_ID};
pub use permission::{AccessLevel, Permission, PermissionAction, PermissionCategory, ResourceKind};
pub use permission_matrix::{PermissionMatrix, RoleDefinition, standard_role_definitions};
pub use role::{Actor, ActorKind, Role};
pub use scope::{
    ManagingRelationship, PermissionContext, RelationshipStatus, ResourceScope,
    UserRoleAssignment,
};
