use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::AppResult;
use leasehold_domain::{ManagingRelationship, PermissionContext, UserRoleAssignment};
use uuid::Uuid;

/// Repository port for role assignments.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Lists every assignment, active or not, held by a subject.
    async fn list_assignments_for_user(&self, user_id: &str)
    -> AppResult<Vec<UserRoleAssignment>>;

    /// Finds one assignment by id.
    async fn find_assignment(&self, assignment_id: Uuid) -> AppResult<Option<UserRoleAssignment>>;

    /// Persists a new assignment.
    async fn save_assignment(&self, assignment: UserRoleAssignment) -> AppResult<()>;

    /// Marks an assignment inactive and returns the updated row.
    async fn deactivate_assignment(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<UserRoleAssignment>>;
}

/// Repository port for managing relationships.
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Lists relationships of an owner that are active at `now`, oldest first.
    async fn list_active_relationships_for_owner(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ManagingRelationship>>;

    /// Finds the active relationship for one organization and owner pair.
    async fn find_active_relationship(
        &self,
        managing_org_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ManagingRelationship>>;

    /// Finds one relationship by id.
    async fn find_relationship(
        &self,
        relationship_id: Uuid,
    ) -> AppResult<Option<ManagingRelationship>>;

    /// Lists the full relationship history of an owner, newest first.
    async fn list_relationships_for_owner(
        &self,
        owner_id: &str,
    ) -> AppResult<Vec<ManagingRelationship>>;

    /// Stores a new active relationship.
    ///
    /// Returns `Conflict` when the pair already has an active relationship.
    async fn start_relationship(&self, relationship: ManagingRelationship) -> AppResult<()>;

    /// Writes the ended projection when the stored row is still active.
    ///
    /// Returns `false` when another writer ended it first.
    async fn mark_relationship_ended(&self, relationship: &ManagingRelationship)
    -> AppResult<bool>;
}

/// Injectable store for resolved permission contexts.
#[async_trait]
pub trait PermissionContextCache: Send + Sync {
    /// Returns a cached context.
    async fn get_context(&self, key: &str) -> AppResult<Option<PermissionContext>>;

    /// Stores a context for `ttl_seconds`. A zero ttl skips the write.
    async fn set_context(
        &self,
        key: &str,
        context: &PermissionContext,
        ttl_seconds: u32,
    ) -> AppResult<()>;

    /// Drops a cached context.
    async fn invalidate(&self, key: &str) -> AppResult<()>;
}
