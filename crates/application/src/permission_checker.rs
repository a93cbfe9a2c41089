use std::sync::Arc;

use leasehold_core::{AppError, AppResult, RequestContext};
use leasehold_domain::{
    AccessLevel, Actor, AuditAction, PermissionAction, PermissionCategory, PermissionMatrix,
    ResourceKind, Role,
};
use serde_json::json;

use crate::{AuditEntry, AuditLogger, Clock, RoleAssignmentRepository};

/// One permission question, optionally about a specific resource instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheck {
    /// Functional area.
    pub category: PermissionCategory,
    /// Guarded resource type.
    pub resource: ResourceKind,
    /// Requested action.
    pub action: PermissionAction,
    /// Resource instance, when the check targets one.
    pub resource_id: Option<String>,
}

impl PermissionCheck {
    /// Creates a type-level check.
    #[must_use]
    pub fn new(
        category: PermissionCategory,
        resource: ResourceKind,
        action: PermissionAction,
    ) -> Self {
        Self {
            category,
            resource,
            action,
            resource_id: None,
        }
    }

    /// Narrows the check to one resource instance.
    #[must_use]
    pub fn on(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

/// Single entry point for role and scope based permission decisions.
#[derive(Clone)]
pub struct PermissionChecker {
    matrix: Arc<PermissionMatrix>,
    assignments: Arc<dyn RoleAssignmentRepository>,
    audit_logger: AuditLogger,
    clock: Arc<dyn Clock>,
}

impl PermissionChecker {
    /// Creates a checker from the seeded matrix and assignment store.
    #[must_use]
    pub fn new(
        matrix: Arc<PermissionMatrix>,
        assignments: Arc<dyn RoleAssignmentRepository>,
        audit_logger: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            matrix,
            assignments,
            audit_logger,
            clock,
        }
    }

    /// Returns the seeded permission matrix.
    #[must_use]
    pub fn matrix(&self) -> &PermissionMatrix {
        self.matrix.as_ref()
    }

    /// Returns whether the user may perform the checked action.
    ///
    /// Grants come from the role's defaults, the defaults of every active
    /// blanket assignment the user holds, or an active scope covering the
    /// checked instance at the required access level.
    pub async fn has_permission(
        &self,
        user_id: &str,
        role: Role,
        check: &PermissionCheck,
    ) -> AppResult<bool> {
        if self.role_grants(role, check) {
            return Ok(true);
        }

        let assignments = self.assignments.list_assignments_for_user(user_id).await?;

        if assignments
            .iter()
            .filter_map(|assignment| assignment.active_blanket_role())
            .any(|assigned_role| self.role_grants(assigned_role, check))
        {
            return Ok(true);
        }

        let Some(resource_id) = check.resource_id.as_deref() else {
            return Ok(false);
        };
        let required = check.action.required_access_level();

        Ok(assignments
            .iter()
            .filter_map(|assignment| assignment.active_scope())
            .any(|scope| {
                scope.covers(check.resource, resource_id) && scope.access_level.satisfies(required)
            }))
    }

    /// Returns whether the actor is a super admin through the primary role or
    /// an active blanket assignment.
    pub async fn is_super_admin(&self, actor: &Actor) -> AppResult<bool> {
        if actor.is_super_admin() {
            return Ok(true);
        }

        Ok(self
            .assignments
            .list_assignments_for_user(actor.subject())
            .await?
            .iter()
            .any(|assignment| assignment.active_blanket_role() == Some(Role::SuperAdmin)))
    }

    /// Returns whether any active scope of the user names the resource.
    pub async fn can_access_resource(
        &self,
        user_id: &str,
        resource_id: &str,
        resource_type: ResourceKind,
    ) -> AppResult<bool> {
        Ok(self
            .scoped_access_level(user_id, resource_type, resource_id)
            .await?
            .is_some())
    }

    /// Returns the highest access level the user's active scopes grant on
    /// the resource.
    pub async fn scoped_access_level(
        &self,
        user_id: &str,
        resource_type: ResourceKind,
        resource_id: &str,
    ) -> AppResult<Option<AccessLevel>> {
        let assignments = self.assignments.list_assignments_for_user(user_id).await?;

        Ok(assignments
            .iter()
            .filter_map(|assignment| assignment.active_scope())
            .filter(|scope| scope.covers(resource_type, resource_id))
            .map(|scope| scope.access_level)
            .max())
    }

    /// Ensures the actor passes the check, auditing and rejecting otherwise.
    pub async fn authorize(
        &self,
        actor: &Actor,
        check: &PermissionCheck,
        context: &RequestContext,
    ) -> AppResult<()> {
        if self
            .has_permission(actor.subject(), actor.role(), check)
            .await?
        {
            return Ok(());
        }

        let reason = format!(
            "subject '{}' is missing permission '{}.{}.{}'",
            actor.subject(),
            check.category.as_str(),
            check.resource.as_str(),
            check.action.as_str()
        );
        Err(self
            .deny(
                actor,
                check.resource,
                check.resource_id.as_deref(),
                reason,
                context,
            )
            .await)
    }

    /// Records a denied-access audit entry and returns the matching error.
    pub async fn deny(
        &self,
        actor: &Actor,
        resource: ResourceKind,
        resource_id: Option<&str>,
        reason: String,
        context: &RequestContext,
    ) -> AppError {
        let mut entry = AuditEntry::for_actor(
            actor,
            AuditAction::AccessDenied,
            resource.as_str(),
            context,
            self.clock.now(),
        )
        .with_states(None, Some(json!({ "reason": reason })))
        .denied();
        if let Some(resource_id) = resource_id {
            entry = entry.on_resource(resource_id);
        }

        self.audit_logger.record(entry, context).await;
        AppError::Forbidden(reason)
    }

    fn role_grants(&self, role: Role, check: &PermissionCheck) -> bool {
        self.matrix
            .has_default_permission(role, check.category, check.resource, check.action)
    }
}
