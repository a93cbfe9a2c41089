use chrono::{DateTime, Utc};
use leasehold_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::{AccessLevel, ResourceKind};
use crate::role::{ActorKind, Role};

/// Narrows a role grant to one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceScope {
    /// Scoped resource type.
    pub resource_type: ResourceKind,
    /// Scoped resource identifier.
    pub resource_id: String,
    /// Granted access level on the resource.
    pub access_level: AccessLevel,
}

impl ResourceScope {
    /// Creates a validated scope.
    pub fn new(
        resource_type: ResourceKind,
        resource_id: impl Into<String>,
        access_level: AccessLevel,
    ) -> AppResult<Self> {
        let resource_id = NonEmptyString::new(resource_id)
            .map_err(|_| AppError::Validation("scope resource_id must not be empty".to_owned()))?;

        Ok(Self {
            resource_type,
            resource_id: resource_id.into(),
            access_level,
        })
    }

    /// Returns whether the scope names the given resource instance.
    #[must_use]
    pub fn covers(&self, resource_type: ResourceKind, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }
}

/// One role held by a user, optionally narrowed to a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    /// Stable assignment identifier.
    pub assignment_id: Uuid,
    /// Subject holding the role.
    pub user_id: String,
    /// Kind of party the subject acts for.
    pub user_type: ActorKind,
    /// Assigned role.
    pub role: Role,
    /// Inactive assignments grant nothing.
    pub is_active: bool,
    /// Optional narrowing to one resource.
    pub scope: Option<ResourceScope>,
}

impl UserRoleAssignment {
    /// Creates an active assignment.
    pub fn new(
        user_id: impl Into<String>,
        user_type: ActorKind,
        role: Role,
        scope: Option<ResourceScope>,
    ) -> AppResult<Self> {
        let user_id = NonEmptyString::new(user_id)
            .map_err(|_| AppError::Validation("assignment user_id must not be empty".to_owned()))?;

        Ok(Self {
            assignment_id: Uuid::new_v4(),
            user_id: user_id.into(),
            user_type,
            role,
            is_active: true,
            scope,
        })
    }

    /// Returns the scope when this is an active scoped assignment.
    #[must_use]
    pub fn active_scope(&self) -> Option<&ResourceScope> {
        self.scope.as_ref().filter(|_| self.is_active)
    }

    /// Returns the role when this is an active blanket assignment.
    #[must_use]
    pub fn active_blanket_role(&self) -> Option<Role> {
        (self.is_active && self.scope.is_none()).then_some(self.role)
    }
}

/// Lifecycle status of a managing relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    /// Relationship in force.
    Active,
    /// Relationship terminated.
    Ended,
}

impl RelationshipStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }

    /// Parses a storage value into a status.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            _ => Err(AppError::Validation(format!(
                "unknown relationship status '{value}'"
            ))),
        }
    }
}

/// Delegation link between a managing organization and an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagingRelationship {
    /// Stable relationship identifier.
    pub relationship_id: Uuid,
    /// Managing organization identifier.
    pub managing_org_id: String,
    /// Owner identifier.
    pub owner_id: String,
    /// Lifecycle status.
    pub status: RelationshipStatus,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Scheduled or actual end timestamp.
    pub ended_at: Option<DateTime<Utc>>,
}

impl ManagingRelationship {
    /// Starts a new active relationship.
    pub fn start(
        managing_org_id: impl Into<String>,
        owner_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let managing_org_id = NonEmptyString::new(managing_org_id).map_err(|_| {
            AppError::Validation("relationship managing_org_id must not be empty".to_owned())
        })?;
        let owner_id = NonEmptyString::new(owner_id).map_err(|_| {
            AppError::Validation("relationship owner_id must not be empty".to_owned())
        })?;

        Ok(Self {
            relationship_id: Uuid::new_v4(),
            managing_org_id: managing_org_id.into(),
            owner_id: owner_id.into(),
            status: RelationshipStatus::Active,
            started_at,
            ended_at: None,
        })
    }

    /// Active iff status is active and the end, if any, lies in the future.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == RelationshipStatus::Active
            && self.ended_at.is_none_or(|ended_at| ended_at > now)
    }

    /// Returns the ended projection of this relationship.
    pub fn end(&self, ended_at: DateTime<Utc>) -> AppResult<Self> {
        if self.status == RelationshipStatus::Ended {
            return Err(AppError::Conflict(format!(
                "managing relationship '{}' has already ended",
                self.relationship_id
            )));
        }

        if ended_at < self.started_at {
            return Err(AppError::Validation(
                "relationship ended_at must not precede started_at".to_owned(),
            ));
        }

        Ok(Self {
            status: RelationshipStatus::Ended,
            ended_at: Some(ended_at),
            ..self.clone()
        })
    }
}

/// Edit capabilities resolved for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionContext {
    /// General edit capability.
    pub can_edit: bool,
    /// May create new properties.
    pub can_add_properties: bool,
    /// May edit existing properties.
    pub can_edit_properties: bool,
    /// May edit tenants.
    pub can_edit_tenants: bool,
    /// May edit leases.
    pub can_edit_leases: bool,
    /// May edit maintenance records.
    pub can_edit_maintenance: bool,
    /// Owner is administered by a managing organization.
    pub is_managed: bool,
    /// Managing organization, when managed.
    pub managing_org: Option<String>,
}

impl PermissionContext {
    /// Every capability granted, unmanaged.
    #[must_use]
    pub fn full_access() -> Self {
        Self {
            can_edit: true,
            can_add_properties: true,
            can_edit_properties: true,
            can_edit_tenants: true,
            can_edit_leases: true,
            can_edit_maintenance: true,
            is_managed: false,
            managing_org: None,
        }
    }

    /// Every capability withheld, unmanaged.
    #[must_use]
    pub fn view_only() -> Self {
        Self {
            can_edit: false,
            can_add_properties: false,
            can_edit_properties: false,
            can_edit_tenants: false,
            can_edit_leases: false,
            can_edit_maintenance: false,
            is_managed: false,
            managing_org: None,
        }
    }

    /// Applies management by an organization.
    ///
    /// Owners keep the ability to add properties; every edit flag is lifted
    /// to the managing organization.
    #[must_use]
    pub fn managed_by(self, managing_org_id: impl Into<String>) -> Self {
        Self {
            can_edit: false,
            can_edit_properties: false,
            can_edit_tenants: false,
            can_edit_leases: false,
            can_edit_maintenance: false,
            is_managed: true,
            managing_org: Some(managing_org_id.into()),
            ..self
        }
    }
}
