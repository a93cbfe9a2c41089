use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use leasehold_application::{ApprovalRequestQuery, ApprovalRequestRepository};
use leasehold_core::{AppError, AppResult};
use leasehold_domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalStatus, ApprovalTransition, ApprovalType,
};

#[cfg(test)]
mod tests;

const REQUEST_COLUMNS: &str = r#"
    id,
    requested_by,
    owner_id,
    approval_type,
    entity_type,
    entity_id,
    title,
    amount_cents,
    description,
    status,
    decided_by,
    decided_at,
    expires_at,
    notes,
    created_at,
    updated_at
"#;

/// PostgreSQL-backed approval request repository.
#[derive(Clone)]
pub struct PostgresApprovalRequestRepository {
    pool: PgPool,
}

impl PostgresApprovalRequestRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ApprovalRequestRow {
    id: uuid::Uuid,
    requested_by: String,
    owner_id: String,
    approval_type: String,
    entity_type: String,
    entity_id: Option<String>,
    title: String,
    amount_cents: Option<i64>,
    description: Option<String>,
    status: String,
    decided_by: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApprovalRequestRow {
    fn into_request(self) -> AppResult<ApprovalRequest> {
        Ok(ApprovalRequest {
            id: ApprovalRequestId::from_uuid(self.id),
            requested_by: self.requested_by,
            owner_id: self.owner_id,
            approval_type: self.approval_type.parse::<ApprovalType>().map_err(|error| {
                AppError::Internal(format!(
                    "stored approval request '{}' has invalid type: {error}",
                    self.id
                ))
            })?,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            title: self.title,
            amount_cents: self.amount_cents,
            description: self.description,
            status: self.status.parse::<ApprovalStatus>().map_err(|error| {
                AppError::Internal(format!(
                    "stored approval request '{}' has invalid status: {error}",
                    self.id
                ))
            })?,
            decided_by: self.decided_by,
            decided_at: self.decided_at,
            expires_at: self.expires_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl ApprovalRequestRepository for PostgresApprovalRequestRepository {
    async fn insert_request(&self, request: ApprovalRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO approval_requests (
                id,
                requested_by,
                owner_id,
                approval_type,
                entity_type,
                entity_id,
                title,
                amount_cents,
                description,
                status,
                decided_by,
                decided_at,
                expires_at,
                notes,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.requested_by)
        .bind(request.owner_id)
        .bind(request.approval_type.as_str())
        .bind(request.entity_type)
        .bind(request.entity_id)
        .bind(request.title)
        .bind(request.amount_cents)
        .bind(request.description)
        .bind(request.status.as_str())
        .bind(request.decided_by)
        .bind(request.decided_at)
        .bind(request.expires_at)
        .bind(request.notes)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert approval request: {error}"))
        })?;

        Ok(())
    }

    async fn find_request(
        &self,
        request_id: ApprovalRequestId,
    ) -> AppResult<Option<ApprovalRequest>> {
        let row = sqlx::query_as::<_, ApprovalRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_requests WHERE id = $1"
        ))
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find approval request '{request_id}': {error}"
            ))
        })?;

        row.map(ApprovalRequestRow::into_request).transpose()
    }

    async fn apply_transition(
        &self,
        transition: &ApprovalTransition,
    ) -> AppResult<Option<ApprovalRequest>> {
        let row = sqlx::query_as::<_, ApprovalRequestRow>(&format!(
            r#"
            UPDATE approval_requests
            SET status = $3,
                decided_by = $4,
                decided_at = $5,
                notes = $6,
                updated_at = $5
            WHERE id = $1
                AND status = $2
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(transition.request_id.as_uuid())
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(transition.decided_by.as_str())
        .bind(transition.decided_at)
        .bind(transition.notes.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to transition approval request '{}': {error}",
                transition.request_id
            ))
        })?;

        row.map(ApprovalRequestRow::into_request).transpose()
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let rows = sqlx::query_as::<_, ApprovalRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM approval_requests
            WHERE status = $1
                AND expires_at <= $2
            ORDER BY expires_at, id
            LIMIT $3
            "#
        ))
        .bind(ApprovalStatus::Pending.as_str())
        .bind(now)
        .bind(limit.clamp(1, 10_000) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list approval requests due for expiry: {error}"
            ))
        })?;

        rows.into_iter()
            .map(ApprovalRequestRow::into_request)
            .collect()
    }

    async fn list_requests(&self, query: ApprovalRequestQuery) -> AppResult<Vec<ApprovalRequest>> {
        let rows = sqlx::query_as::<_, ApprovalRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM approval_requests
            WHERE ($1::TEXT IS NULL OR owner_id = $1)
                AND ($2::TEXT IS NULL OR requested_by = $2)
                AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY created_at DESC, id
            LIMIT $4
            OFFSET $5
            "#
        ))
        .bind(query.owner_id)
        .bind(query.requested_by)
        .bind(query.status.map(|status| status.as_str()))
        .bind(query.limit.clamp(1, 500) as i64)
        .bind(query.offset.min(50_000) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list approval requests: {error}")))?;

        rows.into_iter()
            .map(ApprovalRequestRow::into_request)
            .collect()
    }
}
