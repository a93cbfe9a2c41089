use std::sync::Arc;

use leasehold_core::{AppError, AppResult, RequestContext};
use leasehold_domain::{
    Actor, AuditAction, PermissionAction, PermissionCategory, ResourceKind, ResourceScope, Role,
    UserRoleAssignment,
};
use tracing::info;
use uuid::Uuid;

use crate::deadline::within_deadline;
use crate::permission_checker::{PermissionCheck, PermissionChecker};
use crate::{AuditEntry, AuditLogger, Clock, RoleAssignmentRepository};

/// Boundary input for granting a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// Subject receiving the role.
    pub user_id: String,
    /// Role name as received from the caller; normalized before use.
    pub role: String,
    /// Optional narrowing to one resource.
    pub scope: Option<ResourceScope>,
}

/// Administration of role assignments and resource scopes.
#[derive(Clone)]
pub struct RoleAssignmentService {
    permission_checker: PermissionChecker,
    repository: Arc<dyn RoleAssignmentRepository>,
    audit_logger: AuditLogger,
    clock: Arc<dyn Clock>,
}

impl RoleAssignmentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        permission_checker: PermissionChecker,
        repository: Arc<dyn RoleAssignmentRepository>,
        audit_logger: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            permission_checker,
            repository,
            audit_logger,
            clock,
        }
    }

    /// Grants a role, optionally scoped to one resource.
    pub async fn assign(
        &self,
        actor: &Actor,
        input: AssignRoleInput,
        context: &RequestContext,
    ) -> AppResult<UserRoleAssignment> {
        let role = Role::normalize(&input.role)?;
        self.require_manage(actor, context).await?;
        self.guard_super_admin(actor, role, context).await?;

        let assignment =
            UserRoleAssignment::new(input.user_id, role.actor_kind(), role, input.scope)?;
        within_deadline(
            context,
            "save role assignment",
            self.repository.save_assignment(assignment.clone()),
        )
        .await?;

        info!(
            assignment_id = %assignment.assignment_id,
            user_id = %assignment.user_id,
            role = role.as_str(),
            scoped = assignment.scope.is_some(),
            "role assigned"
        );
        self.audit(actor, AuditAction::RoleAssigned, None, &assignment, context)
            .await;

        Ok(assignment)
    }

    /// Deactivates an assignment. The row is kept for history.
    pub async fn deactivate(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        context: &RequestContext,
    ) -> AppResult<UserRoleAssignment> {
        self.require_manage(actor, context).await?;

        let assignment = within_deadline(
            context,
            "find role assignment",
            self.repository.find_assignment(assignment_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("role assignment '{assignment_id}' not found")))?;

        if !assignment.is_active {
            return Err(AppError::Conflict(format!(
                "role assignment '{assignment_id}' is already inactive"
            )));
        }
        self.guard_super_admin(actor, assignment.role, context)
            .await?;

        let deactivated = within_deadline(
            context,
            "deactivate role assignment",
            self.repository.deactivate_assignment(assignment_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("role assignment '{assignment_id}' not found")))?;

        info!(
            assignment_id = %assignment_id,
            user_id = %deactivated.user_id,
            "role assignment deactivated"
        );
        self.audit(
            actor,
            AuditAction::RoleAssignmentDeactivated,
            Some(&assignment),
            &deactivated,
            context,
        )
        .await;

        Ok(deactivated)
    }

    /// Lists every assignment, active or not, of one subject.
    pub async fn list_for_user(
        &self,
        actor: &Actor,
        user_id: &str,
        context: &RequestContext,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        self.require_manage(actor, context).await?;

        within_deadline(
            context,
            "list role assignments",
            self.repository.list_assignments_for_user(user_id),
        )
        .await
    }

    async fn require_manage(&self, actor: &Actor, context: &RequestContext) -> AppResult<()> {
        self.permission_checker
            .authorize(
                actor,
                &PermissionCheck::new(
                    PermissionCategory::Administration,
                    ResourceKind::RoleAssignment,
                    PermissionAction::Manage,
                ),
                context,
            )
            .await
    }

    /// Only super admins may grant or revoke the super admin role.
    async fn guard_super_admin(
        &self,
        actor: &Actor,
        role: Role,
        context: &RequestContext,
    ) -> AppResult<()> {
        if role != Role::SuperAdmin || self.permission_checker.is_super_admin(actor).await? {
            return Ok(());
        }

        Err(self
            .permission_checker
            .deny(
                actor,
                ResourceKind::RoleAssignment,
                None,
                format!(
                    "subject '{}' may not manage the super admin role",
                    actor.subject()
                ),
                context,
            )
            .await)
    }

    async fn audit(
        &self,
        actor: &Actor,
        action: AuditAction,
        before: Option<&UserRoleAssignment>,
        after: &UserRoleAssignment,
        context: &RequestContext,
    ) {
        let entry = AuditEntry::for_actor(
            actor,
            action,
            ResourceKind::RoleAssignment.as_str(),
            context,
            self.clock.now(),
        )
        .on_resource(after.assignment_id.to_string())
        .with_states(
            before.and_then(|assignment| serde_json::to_value(assignment).ok()),
            serde_json::to_value(after).ok(),
        );

        self.audit_logger.record(entry, context).await;
    }
}

#[cfg(test)]
mod tests {
    use leasehold_core::{AppError, RequestContext};
    use leasehold_domain::{
        AccessLevel, Actor, AuditAction, PermissionAction, PermissionCategory, ResourceKind,
        ResourceScope, Role,
    };

    use super::AssignRoleInput;
    use crate::permission_checker::PermissionCheck;
    use crate::test_support::TestHarness;

    fn admin() -> Actor {
        Actor::new("staff-1", Role::Admin)
    }

    fn scoped_staff_input() -> AssignRoleInput {
        AssignRoleInput {
            user_id: "m1-staff".to_owned(),
            role: "pmc_staff".to_owned(),
            scope: Some(
                ResourceScope::new(ResourceKind::Property, "p1", AccessLevel::Write)
                    .unwrap_or_else(|error| panic!("scope should be valid: {error}")),
            ),
        }
    }

    #[tokio::test]
    async fn assigned_scope_feeds_permission_checks() {
        let harness = TestHarness::new();
        let assignment = harness
            .role_assignment_service()
            .assign(&admin(), scoped_staff_input(), &RequestContext::default())
            .await
            .unwrap_or_else(|error| panic!("role should be assigned: {error}"));

        assert_eq!(assignment.role, Role::PmcStaff);
        let allowed = harness
            .permission_checker()
            .has_permission(
                "m1-staff",
                Role::PmcStaff,
                &PermissionCheck::new(
                    PermissionCategory::PropertyManagement,
                    ResourceKind::Property,
                    PermissionAction::Update,
                )
                .on("p1"),
            )
            .await;
        assert!(matches!(allowed, Ok(true)));

        let entries = harness.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::RoleAssigned);
    }

    #[tokio::test]
    async fn unknown_role_name_is_rejected() {
        let harness = TestHarness::new();
        let result = harness
            .role_assignment_service()
            .assign(
                &admin(),
                AssignRoleInput {
                    role: "janitor".to_owned(),
                    ..scoped_staff_input()
                },
                &RequestContext::default(),
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn only_super_admin_grants_super_admin() {
        let harness = TestHarness::new();
        let service = harness.role_assignment_service();
        let input = AssignRoleInput {
            user_id: "staff-2".to_owned(),
            role: "super_admin".to_owned(),
            scope: None,
        };

        let by_admin = service
            .assign(&admin(), input.clone(), &RequestContext::default())
            .await;
        let by_root = service
            .assign(
                &Actor::new("root", Role::SuperAdmin),
                input,
                &RequestContext::default(),
            )
            .await;

        assert!(matches!(by_admin, Err(AppError::Forbidden(_))));
        assert!(by_root.is_ok());
    }

    #[tokio::test]
    async fn owner_cannot_manage_assignments() {
        let harness = TestHarness::new();
        let result = harness
            .role_assignment_service()
            .list_for_user(
                &Actor::new("o1", Role::Owner),
                "m1-staff",
                &RequestContext::default(),
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn deactivated_assignment_stops_granting() {
        let harness = TestHarness::new();
        let service = harness.role_assignment_service();
        let assignment = service
            .assign(&admin(), scoped_staff_input(), &RequestContext::default())
            .await
            .unwrap_or_else(|error| panic!("role should be assigned: {error}"));

        let deactivated = service
            .deactivate(&admin(), assignment.assignment_id, &RequestContext::default())
            .await
            .unwrap_or_else(|error| panic!("assignment should deactivate: {error}"));
        let again = service
            .deactivate(&admin(), assignment.assignment_id, &RequestContext::default())
            .await;

        assert!(!deactivated.is_active);
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert!(matches!(
            harness
                .permission_checker()
                .can_access_resource("m1-staff", "p1", ResourceKind::Property)
                .await,
            Ok(false)
        ));

        let history = service
            .list_for_user(&admin(), "m1-staff", &RequestContext::default())
            .await
            .unwrap_or_else(|error| panic!("history should list: {error}"));
        assert_eq!(history.len(), 1);
    }
}
