use chrono::{Duration, Utc};
use leasehold_application::{RelationshipRepository, RoleAssignmentRepository};
use leasehold_core::AppError;
use leasehold_domain::{
    AccessLevel, ActorKind, ManagingRelationship, RelationshipStatus, ResourceKind,
    ResourceScope, Role, UserRoleAssignment,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresAuthorizationRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres authorization tests: {error}");
    }

    Some(pool)
}

#[tokio::test]
async fn scoped_assignment_round_trips_and_deactivates() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuthorizationRepository::new(pool);
    let user_id = format!("staff-{}", Uuid::new_v4());
    let scope = ResourceScope::new(ResourceKind::Property, "p1", AccessLevel::Write)
        .unwrap_or_else(|error| panic!("scope should be valid: {error}"));
    let assignment = UserRoleAssignment::new(
        user_id.as_str(),
        ActorKind::ManagingOrganization,
        Role::PmcStaff,
        Some(scope.clone()),
    )
    .unwrap_or_else(|error| panic!("assignment should be valid: {error}"));

    assert!(repository.save_assignment(assignment.clone()).await.is_ok());

    let listed = repository
        .list_assignments_for_user(user_id.as_str())
        .await
        .unwrap_or_else(|error| panic!("assignments should load: {error}"));
    assert_eq!(listed, vec![assignment.clone()]);
    assert_eq!(listed[0].scope.as_ref(), Some(&scope));

    let deactivated = repository
        .deactivate_assignment(assignment.assignment_id)
        .await
        .unwrap_or_else(|error| panic!("assignment should deactivate: {error}"));
    assert_eq!(deactivated.map(|assignment| assignment.is_active), Some(false));
}

#[tokio::test]
async fn one_active_relationship_per_pair() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuthorizationRepository::new(pool);
    let owner_id = format!("owner-{}", Uuid::new_v4());
    let now = Utc::now();
    let first = ManagingRelationship::start("m1", owner_id.as_str(), now - Duration::days(1))
        .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
    let duplicate = ManagingRelationship::start("m1", owner_id.as_str(), now)
        .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));

    assert!(repository.start_relationship(first.clone()).await.is_ok());
    assert!(matches!(
        repository.start_relationship(duplicate).await,
        Err(AppError::Conflict(_))
    ));

    let active = repository
        .list_active_relationships_for_owner(owner_id.as_str(), now)
        .await
        .unwrap_or_else(|error| panic!("relationships should load: {error}"));
    assert_eq!(active.len(), 1);

    let ended = first
        .end(now)
        .unwrap_or_else(|error| panic!("relationship should end: {error}"));
    assert!(matches!(
        repository.mark_relationship_ended(&ended).await,
        Ok(true)
    ));
    assert!(matches!(
        repository.mark_relationship_ended(&ended).await,
        Ok(false)
    ));

    let found = repository
        .find_active_relationship("m1", owner_id.as_str(), now)
        .await
        .unwrap_or_else(|error| panic!("relationship lookup should run: {error}"));
    assert!(found.is_none());

    let history = repository
        .list_relationships_for_owner(owner_id.as_str())
        .await
        .unwrap_or_else(|error| panic!("history should load: {error}"));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RelationshipStatus::Ended);

    let restarted = ManagingRelationship::start("m1", owner_id.as_str(), now)
        .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
    assert!(repository.start_relationship(restarted).await.is_ok());
}
