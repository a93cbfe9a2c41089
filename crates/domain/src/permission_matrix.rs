use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::permission::{Permission, PermissionAction, PermissionCategory, ResourceKind};
use crate::role::Role;

/// Seeded role reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Canonical role.
    pub role: Role,
    /// Human-readable role name.
    pub display_name: String,
    /// Inactive roles grant nothing.
    pub is_active: bool,
    /// Grants held by every subject with this role.
    pub default_permissions: BTreeSet<Permission>,
}

impl RoleDefinition {
    /// Creates an active role definition with the given grants.
    #[must_use]
    pub fn new(role: Role, default_permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            role,
            display_name: role.display_name().to_owned(),
            is_active: true,
            default_permissions: default_permissions.into_iter().collect(),
        }
    }

    /// Marks the definition inactive.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Static mapping of role to default grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    roles: HashMap<Role, RoleDefinition>,
}

impl PermissionMatrix {
    /// Builds a matrix from seeded role definitions. Later duplicates win.
    #[must_use]
    pub fn new(definitions: impl IntoIterator<Item = RoleDefinition>) -> Self {
        Self {
            roles: definitions
                .into_iter()
                .map(|definition| (definition.role, definition))
                .collect(),
        }
    }

    /// Builds the standard property-management matrix.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(standard_role_definitions())
    }

    /// Returns the definition seeded for a role.
    #[must_use]
    pub fn definition(&self, role: Role) -> Option<&RoleDefinition> {
        self.roles.get(&role)
    }

    /// Returns whether the role's default grants cover the requested action.
    ///
    /// `SuperAdmin` passes without consulting the matrix. Missing or inactive
    /// roles yield `false`.
    #[must_use]
    pub fn has_default_permission(
        &self,
        role: Role,
        category: PermissionCategory,
        resource: ResourceKind,
        action: PermissionAction,
    ) -> bool {
        if role == Role::SuperAdmin {
            return true;
        }

        let requested = Permission::new(category, resource, action);
        std::iter::once(role)
            .chain(role.inherits().iter().copied())
            .filter_map(|candidate| self.active_definition(candidate))
            .any(|definition| {
                definition
                    .default_permissions
                    .iter()
                    .any(|grant| grant.implies(&requested))
            })
    }

    /// Returns the grants held through the role and every inherited role.
    #[must_use]
    pub fn effective_permissions(&self, role: Role) -> BTreeSet<Permission> {
        std::iter::once(role)
            .chain(role.inherits().iter().copied())
            .filter_map(|candidate| self.active_definition(candidate))
            .flat_map(|definition| definition.default_permissions.iter().copied())
            .collect()
    }

    fn active_definition(&self, role: Role) -> Option<&RoleDefinition> {
        self.roles
            .get(&role)
            .filter(|definition| definition.is_active)
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

fn grants(
    category: PermissionCategory,
    resource: ResourceKind,
    actions: &[PermissionAction],
) -> impl Iterator<Item = Permission> + '_ {
    actions
        .iter()
        .map(move |action| Permission::new(category, resource, *action))
}

/// Returns the role definitions seeded at bootstrap.
#[must_use]
pub fn standard_role_definitions() -> Vec<RoleDefinition> {
    use PermissionAction::{Create, Manage, Read, Update};
    use PermissionCategory::{Administration, Approvals, Financial, Maintenance, PropertyManagement};
    use ResourceKind::{
        ApprovalRequest, AuditLog, Expense, Lease, MaintenanceRequest, ManagingRelationship,
        Property, Report, RoleAssignment, Tenant, Unit, User, Vendor, WorkOrder,
    };

    let admin = [Property, Unit, Tenant, Lease]
        .into_iter()
        .flat_map(|resource| grants(PropertyManagement, resource, &[Manage]).collect::<Vec<_>>())
        .chain(grants(Maintenance, MaintenanceRequest, &[Manage]))
        .chain(grants(Maintenance, WorkOrder, &[Manage]))
        .chain(grants(Maintenance, Vendor, &[Manage]))
        .chain(grants(Financial, Expense, &[Manage]))
        .chain(grants(Financial, Report, &[Manage]))
        .chain(grants(Approvals, ApprovalRequest, &[Manage]))
        .chain(grants(Administration, User, &[Manage]))
        .chain(grants(Administration, RoleAssignment, &[Manage]))
        .chain(grants(Administration, ManagingRelationship, &[Manage]))
        .chain(grants(Administration, AuditLog, &[Read]))
        .collect::<Vec<_>>();

    let owner = [Property, Unit, Tenant, Lease]
        .into_iter()
        .flat_map(|resource| grants(PropertyManagement, resource, &[Manage]).collect::<Vec<_>>())
        .chain(grants(Maintenance, MaintenanceRequest, &[Manage]))
        .chain(grants(Maintenance, WorkOrder, &[Manage]))
        .chain(grants(Maintenance, Vendor, &[Read]))
        .chain(grants(Financial, Expense, &[Manage]))
        .chain(grants(Financial, Report, &[Read]))
        .chain(grants(Approvals, ApprovalRequest, &[Read, Update]))
        .chain(grants(Administration, ManagingRelationship, &[Read, Update]))
        .collect::<Vec<_>>();

    let pmc_staff = [Property, Unit, Tenant, Lease]
        .into_iter()
        .flat_map(|resource| grants(PropertyManagement, resource, &[Read]).collect::<Vec<_>>())
        .chain(grants(Maintenance, MaintenanceRequest, &[Read, Create]))
        .chain(grants(Maintenance, WorkOrder, &[Read]))
        .chain(grants(Approvals, ApprovalRequest, &[Read]))
        .collect::<Vec<_>>();

    let pmc_manager = grants(Approvals, ApprovalRequest, &[Create])
        .chain(grants(Maintenance, WorkOrder, &[Create]))
        .chain(grants(Maintenance, Vendor, &[Read]))
        .chain(grants(Financial, Expense, &[Read]))
        .chain(grants(Financial, Report, &[Read]))
        .collect::<Vec<_>>();

    let pmc_admin = grants(Maintenance, Vendor, &[Manage])
        .chain(grants(Administration, User, &[Read]))
        .chain(grants(Administration, ManagingRelationship, &[Read]))
        .collect::<Vec<_>>();

    let tenant = grants(Maintenance, MaintenanceRequest, &[Create, Read])
        .chain(grants(PropertyManagement, Lease, &[Read]))
        .collect::<Vec<_>>();

    let vendor = grants(Maintenance, WorkOrder, &[Read, Update]).collect::<Vec<_>>();

    vec![
        RoleDefinition::new(Role::SuperAdmin, Vec::new()),
        RoleDefinition::new(Role::Admin, admin),
        RoleDefinition::new(Role::Owner, owner),
        RoleDefinition::new(Role::PmcAdmin, pmc_admin),
        RoleDefinition::new(Role::PmcManager, pmc_manager),
        RoleDefinition::new(Role::PmcStaff, pmc_staff),
        RoleDefinition::new(Role::Tenant, tenant),
        RoleDefinition::new(Role::Vendor, vendor),
    ]
}
