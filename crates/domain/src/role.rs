use std::fmt::{Display, Formatter};

use leasehold_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Canonical roles known to the engine.
///
/// Raw role strings only exist at the system boundary and are converted
/// once through [`Role::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform operator. Satisfies every permission check.
    SuperAdmin,
    /// Internal administrator.
    Admin,
    /// Resource owner (landlord).
    Owner,
    /// Managing organization administrator.
    PmcAdmin,
    /// Managing organization portfolio manager.
    PmcManager,
    /// Managing organization staff member.
    PmcStaff,
    /// Lease holder.
    Tenant,
    /// Vendor or contractor.
    Vendor,
}

impl Role {
    /// Returns the stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::Owner => "OWNER",
            Self::PmcAdmin => "PMC_ADMIN",
            Self::PmcManager => "PMC_MANAGER",
            Self::PmcStaff => "PMC_STAFF",
            Self::Tenant => "TENANT",
            Self::Vendor => "VENDOR",
        }
    }

    /// Returns the human-readable role name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "Super Administrator",
            Self::Admin => "Administrator",
            Self::Owner => "Property Owner",
            Self::PmcAdmin => "Management Company Administrator",
            Self::PmcManager => "Management Company Manager",
            Self::PmcStaff => "Management Company Staff",
            Self::Tenant => "Tenant",
            Self::Vendor => "Vendor",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[
            Role::SuperAdmin,
            Role::Admin,
            Role::Owner,
            Role::PmcAdmin,
            Role::PmcManager,
            Role::PmcStaff,
            Role::Tenant,
            Role::Vendor,
        ];

        ALL
    }

    /// Roles whose default grants this role inherits, nearest first.
    #[must_use]
    pub fn inherits(&self) -> &'static [Self] {
        match self {
            Self::PmcAdmin => &[Self::PmcManager, Self::PmcStaff],
            Self::PmcManager => &[Self::PmcStaff],
            _ => &[],
        }
    }

    /// Returns the kind of actor that holds this role.
    #[must_use]
    pub fn actor_kind(&self) -> ActorKind {
        match self {
            Self::SuperAdmin | Self::Admin => ActorKind::Internal,
            Self::Owner => ActorKind::Owner,
            Self::PmcAdmin | Self::PmcManager | Self::PmcStaff => ActorKind::ManagingOrganization,
            Self::Tenant => ActorKind::Tenant,
            Self::Vendor => ActorKind::Vendor,
        }
    }

    /// Converts a boundary role spelling into the canonical role.
    ///
    /// Accepts the legacy spellings still emitted by sessions and imports
    /// (`pmc`, `landlord`, `super_admin`, mixed case, dashes).
    pub fn normalize(value: &str) -> AppResult<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");

        match normalized.as_str() {
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "owner" | "landlord" => Ok(Self::Owner),
            "pmc" | "pmc_admin" => Ok(Self::PmcAdmin),
            "pmc_manager" => Ok(Self::PmcManager),
            "pmc_staff" => Ok(Self::PmcStaff),
            "tenant" => Ok(Self::Tenant),
            "vendor" | "contractor" => Ok(Self::Vendor),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Kind of party an actor acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Platform staff.
    Internal,
    /// Resource owner.
    Owner,
    /// Managing organization user.
    ManagingOrganization,
    /// Tenant.
    Tenant,
    /// Vendor or contractor.
    Vendor,
}

impl ActorKind {
    /// Returns a stable storage value for this actor kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Owner => "owner",
            Self::ManagingOrganization => "managing_organization",
            Self::Tenant => "tenant",
            Self::Vendor => "vendor",
        }
    }

    /// Parses a storage value into an actor kind.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "internal" => Ok(Self::Internal),
            "owner" => Ok(Self::Owner),
            "managing_organization" => Ok(Self::ManagingOrganization),
            "tenant" => Ok(Self::Tenant),
            "vendor" => Ok(Self::Vendor),
            _ => Err(AppError::Validation(format!(
                "unknown actor kind value '{value}'"
            ))),
        }
    }
}

/// Authenticated party on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    subject: String,
    role: Role,
    organization_id: Option<String>,
}

impl Actor {
    /// Creates an actor from a subject and its primary role.
    #[must_use]
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
            organization_id: None,
        }
    }

    /// Attaches the organization the actor works for.
    #[must_use]
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Returns the stable subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the primary role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the actor kind derived from the primary role.
    #[must_use]
    pub fn kind(&self) -> ActorKind {
        self.role.actor_kind()
    }

    /// Returns the managing organization id for managing-organization actors.
    #[must_use]
    pub fn managing_organization_id(&self) -> Option<&str> {
        match self.kind() {
            ActorKind::ManagingOrganization => self.organization_id.as_deref(),
            _ => None,
        }
    }

    /// Returns whether the actor bypasses every permission check.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}
