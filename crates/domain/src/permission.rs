use std::fmt::{Display, Formatter};
use std::str::FromStr;

use leasehold_core::AppError;
use serde::{Deserialize, Serialize};

/// Functional area a permission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Properties, units, tenants and leases.
    PropertyManagement,
    /// Maintenance requests, work orders and vendors.
    Maintenance,
    /// Expenses and financial reports.
    Financial,
    /// Delegated approval requests.
    Approvals,
    /// Users, role assignments, relationships and audit logs.
    Administration,
}

impl PermissionCategory {
    /// Returns a stable storage value for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyManagement => "property_management",
            Self::Maintenance => "maintenance",
            Self::Financial => "financial",
            Self::Approvals => "approvals",
            Self::Administration => "administration",
        }
    }
}

impl FromStr for PermissionCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "property_management" => Ok(Self::PropertyManagement),
            "maintenance" => Ok(Self::Maintenance),
            "financial" => Ok(Self::Financial),
            "approvals" => Ok(Self::Approvals),
            "administration" => Ok(Self::Administration),
            _ => Err(AppError::Validation(format!(
                "unknown permission category '{value}'"
            ))),
        }
    }
}

/// Resource types guarded by permissions and scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// An owner (landlord) and everything they own.
    Owner,
    /// A property.
    Property,
    /// A unit within a property.
    Unit,
    /// A tenant record.
    Tenant,
    /// A lease.
    Lease,
    /// A maintenance request.
    MaintenanceRequest,
    /// A work order.
    WorkOrder,
    /// A vendor record.
    Vendor,
    /// An expense.
    Expense,
    /// A financial report.
    Report,
    /// A delegated approval request.
    ApprovalRequest,
    /// A platform user.
    User,
    /// A role assignment.
    RoleAssignment,
    /// A managing relationship between an organization and an owner.
    ManagingRelationship,
    /// The audit trail.
    AuditLog,
}

impl ResourceKind {
    /// Returns a stable storage value for this resource kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owners",
            Self::Property => "properties",
            Self::Unit => "units",
            Self::Tenant => "tenants",
            Self::Lease => "leases",
            Self::MaintenanceRequest => "maintenance_requests",
            Self::WorkOrder => "work_orders",
            Self::Vendor => "vendors",
            Self::Expense => "expenses",
            Self::Report => "reports",
            Self::ApprovalRequest => "approval_requests",
            Self::User => "users",
            Self::RoleAssignment => "role_assignments",
            Self::ManagingRelationship => "managing_relationships",
            Self::AuditLog => "audit_logs",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owners" => Ok(Self::Owner),
            "properties" => Ok(Self::Property),
            "units" => Ok(Self::Unit),
            "tenants" => Ok(Self::Tenant),
            "leases" => Ok(Self::Lease),
            "maintenance_requests" => Ok(Self::MaintenanceRequest),
            "work_orders" => Ok(Self::WorkOrder),
            "vendors" => Ok(Self::Vendor),
            "expenses" => Ok(Self::Expense),
            "reports" => Ok(Self::Report),
            "approval_requests" => Ok(Self::ApprovalRequest),
            "users" => Ok(Self::User),
            "role_assignments" => Ok(Self::RoleAssignment),
            "managing_relationships" => Ok(Self::ManagingRelationship),
            "audit_logs" => Ok(Self::AuditLog),
            _ => Err(AppError::Validation(format!(
                "unknown resource type '{value}'"
            ))),
        }
    }
}

/// Operation requested on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionAction {
    /// Create new instances.
    Create,
    /// Read instances.
    Read,
    /// Update instances.
    Update,
    /// Delete instances.
    Delete,
    /// Every action above.
    Manage,
}

impl PermissionAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Manage => "manage",
        }
    }

    /// Minimum scope access level needed to perform this action.
    #[must_use]
    pub fn required_access_level(&self) -> AccessLevel {
        match self {
            Self::Read => AccessLevel::Read,
            Self::Create | Self::Update | Self::Delete => AccessLevel::Write,
            Self::Manage => AccessLevel::Manage,
        }
    }
}

impl FromStr for PermissionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "manage" => Ok(Self::Manage),
            _ => Err(AppError::Validation(format!(
                "unknown permission action '{value}'"
            ))),
        }
    }
}

/// Access level granted by a resource scope. Ordered `Read < Write < Manage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    /// Read-only access.
    Read,
    /// Read and write access.
    Write,
    /// Full control.
    Manage,
}

impl AccessLevel {
    /// Returns a stable storage value for this access level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Manage => "manage",
        }
    }

    /// Returns whether this level satisfies the required level.
    #[must_use]
    pub fn satisfies(&self, required: AccessLevel) -> bool {
        *self >= required
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "manage" => Ok(Self::Manage),
            _ => Err(AppError::Validation(format!(
                "unknown access level '{value}'"
            ))),
        }
    }
}

/// One `(category, resource, action)` grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    /// Functional area.
    pub category: PermissionCategory,
    /// Guarded resource type.
    pub resource: ResourceKind,
    /// Granted action.
    pub action: PermissionAction,
}

impl Permission {
    /// Creates a permission triple.
    #[must_use]
    pub const fn new(
        category: PermissionCategory,
        resource: ResourceKind,
        action: PermissionAction,
    ) -> Self {
        Self {
            category,
            resource,
            action,
        }
    }

    /// Returns whether holding `self` satisfies a request for `requested`.
    ///
    /// `Manage` implies every other action on the same category and resource.
    #[must_use]
    pub fn implies(&self, requested: &Permission) -> bool {
        self.category == requested.category
            && self.resource == requested.resource
            && (self.action == requested.action || self.action == PermissionAction::Manage)
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}.{}.{}",
            self.category.as_str(),
            self.resource.as_str(),
            self.action.as_str()
        )
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('.');
        let (Some(category), Some(resource), Some(action), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::Validation(format!(
                "permission value '{value}' must have the form category.resource.action"
            )));
        };

        Ok(Self {
            category: category.parse()?,
            resource: resource.parse()?,
            action: action.parse()?,
        })
    }
}
