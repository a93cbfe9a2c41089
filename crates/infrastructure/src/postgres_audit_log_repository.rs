use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use leasehold_application::{AuditEntry, AuditLogQuery, AuditLogRepository};
use leasehold_core::{AppError, AppResult};
use leasehold_domain::{AuditAction, Role};

#[cfg(test)]
mod tests;

/// PostgreSQL-backed repository for audit trail reads.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditEntryRow {
    id: uuid::Uuid,
    actor_id: String,
    actor_role: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    before_state: Option<Value>,
    after_state: Option<Value>,
    changed_fields: Vec<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    success: bool,
    created_at: DateTime<Utc>,
}

impl AuditEntryRow {
    fn into_entry(self) -> AppResult<AuditEntry> {
        Ok(AuditEntry {
            id: self.id,
            actor_id: self.actor_id,
            actor_role: self.actor_role.as_deref().map(Role::normalize).transpose()?,
            action: AuditAction::parse(self.action.as_str())?,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            before_state: self.before_state,
            after_state: self.after_state,
            changed_fields: self.changed_fields,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            success: self.success,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditEntry>> {
        let capped_limit = query.limit.clamp(1, 500) as i64;
        let capped_offset = query.offset.min(50_000) as i64;
        let rows = sqlx::query_as::<_, AuditEntryRow>(
            r#"
            SELECT
                id,
                actor_id,
                actor_role,
                action,
                resource_type,
                resource_id,
                before_state,
                after_state,
                changed_fields,
                ip_address,
                user_agent,
                success,
                created_at
            FROM audit_entries
            WHERE ($1::TEXT IS NULL OR action = $1)
                AND ($2::TEXT IS NULL OR actor_id = $2)
                AND ($3::TEXT IS NULL OR resource_type = $3)
                AND ($4::TEXT IS NULL OR resource_id = $4)
            ORDER BY created_at DESC, id
            LIMIT $5
            OFFSET $6
            "#,
        )
        .bind(query.action.map(|action| action.as_str()))
        .bind(query.actor_id)
        .bind(query.resource_type)
        .bind(query.resource_id)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit entries: {error}")))?;

        rows.into_iter().map(AuditEntryRow::into_entry).collect()
    }
}
