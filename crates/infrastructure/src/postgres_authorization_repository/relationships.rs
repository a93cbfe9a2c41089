use super::*;

const RELATIONSHIP_COLUMNS: &str = "id, managing_org_id, owner_id, status, started_at, ended_at";

#[async_trait]
impl RelationshipRepository for PostgresAuthorizationRepository {
    async fn list_active_relationships_for_owner(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ManagingRelationship>> {
        let rows = sqlx::query_as::<_, RelationshipRow>(&format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM managing_relationships
            WHERE owner_id = $1
                AND status = 'active'
                AND (ended_at IS NULL OR ended_at > $2)
            ORDER BY started_at, managing_org_id
            "#
        ))
        .bind(owner_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load active relationships for owner '{owner_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(RelationshipRow::into_relationship)
            .collect()
    }

    async fn find_active_relationship(
        &self,
        managing_org_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ManagingRelationship>> {
        let row = sqlx::query_as::<_, RelationshipRow>(&format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM managing_relationships
            WHERE managing_org_id = $1
                AND owner_id = $2
                AND status = 'active'
                AND (ended_at IS NULL OR ended_at > $3)
            LIMIT 1
            "#
        ))
        .bind(managing_org_id)
        .bind(owner_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find relationship between '{managing_org_id}' and '{owner_id}': {error}"
            ))
        })?;

        row.map(RelationshipRow::into_relationship).transpose()
    }

    async fn find_relationship(
        &self,
        relationship_id: Uuid,
    ) -> AppResult<Option<ManagingRelationship>> {
        let row = sqlx::query_as::<_, RelationshipRow>(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM managing_relationships WHERE id = $1"
        ))
        .bind(relationship_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find relationship '{relationship_id}': {error}"
            ))
        })?;

        row.map(RelationshipRow::into_relationship).transpose()
    }

    async fn list_relationships_for_owner(
        &self,
        owner_id: &str,
    ) -> AppResult<Vec<ManagingRelationship>> {
        let rows = sqlx::query_as::<_, RelationshipRow>(&format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM managing_relationships
            WHERE owner_id = $1
            ORDER BY started_at DESC, id
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list relationships for owner '{owner_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(RelationshipRow::into_relationship)
            .collect()
    }

    async fn start_relationship(&self, relationship: ManagingRelationship) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO managing_relationships (
                id,
                managing_org_id,
                owner_id,
                status,
                started_at,
                ended_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(relationship.relationship_id)
        .bind(relationship.managing_org_id.as_str())
        .bind(relationship.owner_id.as_str())
        .bind(relationship.status.as_str())
        .bind(relationship.started_at)
        .bind(relationship.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|error| map_relationship_conflict(error, &relationship))?;

        Ok(())
    }

    async fn mark_relationship_ended(
        &self,
        relationship: &ManagingRelationship,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE managing_relationships
            SET status = $2,
                ended_at = $3
            WHERE id = $1
                AND status = 'active'
            "#,
        )
        .bind(relationship.relationship_id)
        .bind(relationship.status.as_str())
        .bind(relationship.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to end relationship '{}': {error}",
                relationship.relationship_id
            ))
        })?;

        Ok(result.rows_affected() == 1)
    }
}

fn map_relationship_conflict(error: sqlx::Error, relationship: &ManagingRelationship) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "'{}' already manages owner '{}'",
            relationship.managing_org_id, relationship.owner_id
        ));
    }

    AppError::Internal(format!("failed to start relationship: {error}"))
}
