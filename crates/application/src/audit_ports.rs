use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::{AppResult, RequestContext};
use leasehold_domain::{Actor, AuditAction, Role, SYSTEM_ACTOR_ID};
use serde_json::Value;
use uuid::Uuid;

/// Immutable audit entry emitted by application services.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Stable entry identifier. Writes are idempotent on this id.
    pub id: Uuid,
    /// Subject that performed the action, or `system`.
    pub actor_id: String,
    /// Role the actor held, absent for system actions.
    pub actor_role: Option<Role>,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: Option<String>,
    /// State before the change.
    pub before_state: Option<Value>,
    /// State after the change.
    pub after_state: Option<Value>,
    /// Top-level fields that differ between before and after.
    pub changed_fields: Vec<String>,
    /// Caller IP address.
    pub ip_address: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
    /// Whether the audited action went through.
    pub success: bool,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Starts a successful entry for an actor.
    #[must_use]
    pub fn for_actor(
        actor: &Actor,
        action: AuditAction,
        resource_type: impl Into<String>,
        context: &RequestContext,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor.subject().to_owned(),
            actor_role: Some(actor.role()),
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            before_state: None,
            after_state: None,
            changed_fields: Vec::new(),
            ip_address: context.ip_address().map(str::to_owned),
            user_agent: context.user_agent().map(str::to_owned),
            success: true,
            created_at,
        }
    }

    /// Starts a successful entry for the scheduler.
    #[must_use]
    pub fn for_system(
        action: AuditAction,
        resource_type: impl Into<String>,
        context: &RequestContext,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: SYSTEM_ACTOR_ID.to_owned(),
            actor_role: None,
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            before_state: None,
            after_state: None,
            changed_fields: Vec::new(),
            ip_address: context.ip_address().map(str::to_owned),
            user_agent: context.user_agent().map(str::to_owned),
            success: true,
            created_at,
        }
    }

    /// Names the affected resource instance.
    #[must_use]
    pub fn on_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Records before and after snapshots and derives the changed fields.
    #[must_use]
    pub fn with_states(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.changed_fields = changed_fields(before.as_ref(), after.as_ref());
        self.before_state = before;
        self.after_state = after;
        self
    }

    /// Marks the entry as a denied or failed action.
    #[must_use]
    pub fn denied(mut self) -> Self {
        self.success = false;
        self
    }
}

fn changed_fields(before: Option<&Value>, after: Option<&Value>) -> Vec<String> {
    let empty = serde_json::Map::new();
    let before = before.and_then(Value::as_object).unwrap_or(&empty);
    let after = after.and_then(Value::as_object).unwrap_or(&empty);

    let mut fields: Vec<String> = before
        .keys()
        .chain(after.keys())
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect();
    fields.sort();
    fields.dedup();
    fields
}

/// Port for persisting append-only audit entries.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one entry. Re-appending an id that is already stored is a no-op.
    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()>;
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter.
    pub action: Option<AuditAction>,
    /// Optional actor filter.
    pub actor_id: Option<String>,
    /// Optional resource type filter.
    pub resource_type: Option<String>,
    /// Optional resource id filter.
    pub resource_id: Option<String>,
}

/// Repository port for reading the audit trail.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists most recent entries first.
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditEntry>>;
}
