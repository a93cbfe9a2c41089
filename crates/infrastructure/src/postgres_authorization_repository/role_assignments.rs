use super::*;

const ASSIGNMENT_COLUMNS: &str = r#"
    id,
    user_id,
    user_type,
    role,
    is_active,
    scope_resource_type,
    scope_resource_id,
    scope_access_level
"#;

#[async_trait]
impl RoleAssignmentRepository for PostgresAuthorizationRepository {
    async fn list_assignments_for_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let rows = sqlx::query_as::<_, RoleAssignmentRow>(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM role_assignments
            WHERE user_id = $1
            ORDER BY created_at, id
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load role assignments for '{user_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(RoleAssignmentRow::into_assignment)
            .collect()
    }

    async fn find_assignment(&self, assignment_id: Uuid) -> AppResult<Option<UserRoleAssignment>> {
        let row = sqlx::query_as::<_, RoleAssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments WHERE id = $1"
        ))
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find role assignment '{assignment_id}': {error}"
            ))
        })?;

        row.map(RoleAssignmentRow::into_assignment).transpose()
    }

    async fn save_assignment(&self, assignment: UserRoleAssignment) -> AppResult<()> {
        let scope = assignment.scope.as_ref();
        sqlx::query(
            r#"
            INSERT INTO role_assignments (
                id,
                user_id,
                user_type,
                role,
                is_active,
                scope_resource_type,
                scope_resource_id,
                scope_access_level
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(assignment.assignment_id)
        .bind(assignment.user_id.as_str())
        .bind(assignment.user_type.as_str())
        .bind(assignment.role.as_str())
        .bind(assignment.is_active)
        .bind(scope.map(|scope| scope.resource_type.as_str()))
        .bind(scope.map(|scope| scope.resource_id.as_str()))
        .bind(scope.map(|scope| scope.access_level.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save role assignment: {error}")))?;

        Ok(())
    }

    async fn deactivate_assignment(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<UserRoleAssignment>> {
        let row = sqlx::query_as::<_, RoleAssignmentRow>(&format!(
            r#"
            UPDATE role_assignments
            SET is_active = FALSE,
                updated_at = now()
            WHERE id = $1
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to deactivate role assignment '{assignment_id}': {error}"
            ))
        })?;

        row.map(RoleAssignmentRow::into_assignment).transpose()
    }
}
