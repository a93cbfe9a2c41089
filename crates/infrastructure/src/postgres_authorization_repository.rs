use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use leasehold_application::{RelationshipRepository, RoleAssignmentRepository};
use leasehold_core::{AppError, AppResult};
use leasehold_domain::{
    AccessLevel, ActorKind, ManagingRelationship, RelationshipStatus, ResourceKind,
    ResourceScope, Role, UserRoleAssignment,
};

mod relationships;
mod role_assignments;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed repository for role assignments and managing relationships.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleAssignmentRow {
    id: Uuid,
    user_id: String,
    user_type: String,
    role: String,
    is_active: bool,
    scope_resource_type: Option<String>,
    scope_resource_id: Option<String>,
    scope_access_level: Option<String>,
}

impl RoleAssignmentRow {
    fn into_assignment(self) -> AppResult<UserRoleAssignment> {
        let decode = |error: AppError| {
            AppError::Internal(format!(
                "failed to decode role assignment '{}': {error}",
                self.id
            ))
        };

        let scope = match (
            self.scope_resource_type.as_deref(),
            self.scope_resource_id.as_deref(),
            self.scope_access_level.as_deref(),
        ) {
            (Some(resource_type), Some(resource_id), Some(access_level)) => Some(ResourceScope {
                resource_type: resource_type.parse::<ResourceKind>().map_err(decode)?,
                resource_id: resource_id.to_owned(),
                access_level: access_level.parse::<AccessLevel>().map_err(decode)?,
            }),
            (None, None, None) => None,
            _ => {
                return Err(AppError::Internal(format!(
                    "role assignment '{}' has a partial scope",
                    self.id
                )));
            }
        };

        Ok(UserRoleAssignment {
            assignment_id: self.id,
            user_type: ActorKind::parse(self.user_type.as_str()).map_err(decode)?,
            role: Role::normalize(self.role.as_str()).map_err(decode)?,
            is_active: self.is_active,
            scope,
            user_id: self.user_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct RelationshipRow {
    id: Uuid,
    managing_org_id: String,
    owner_id: String,
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl RelationshipRow {
    fn into_relationship(self) -> AppResult<ManagingRelationship> {
        Ok(ManagingRelationship {
            relationship_id: self.id,
            status: RelationshipStatus::parse(self.status.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode managing relationship '{}': {error}",
                    self.id
                ))
            })?,
            managing_org_id: self.managing_org_id,
            owner_id: self.owner_id,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}
