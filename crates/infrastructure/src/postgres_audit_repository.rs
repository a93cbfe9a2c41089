use async_trait::async_trait;
use sqlx::PgPool;

use leasehold_application::{AuditEntry, AuditRepository};
use leasehold_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (
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
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(entry.actor_role.map(|role| role.as_str()))
        .bind(entry.action.as_str())
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .bind(entry.before_state)
        .bind(entry.after_state)
        .bind(entry.changed_fields)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .bind(entry.success)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(())
    }
}
