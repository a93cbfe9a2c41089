use chrono::Utc;
use leasehold_application::{AuditEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
use leasehold_core::RequestContext;
use leasehold_domain::{Actor, AuditAction, Role};
use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresAuditLogRepository;
use crate::PostgresAuditRepository;

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
        panic!("failed to run migrations for postgres audit tests: {error}");
    }

    Some(pool)
}

#[tokio::test]
async fn appended_entries_round_trip_and_ignore_duplicate_ids() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let writer = PostgresAuditRepository::new(pool.clone());
    let reader = PostgresAuditLogRepository::new(pool);
    let actor_id = format!("owner-{}", Uuid::new_v4());
    let entry = AuditEntry::for_actor(
        &Actor::new(actor_id.as_str(), Role::Owner),
        AuditAction::ApprovalRequestRejected,
        "approval_requests",
        &RequestContext::new(Some("10.1.2.3".to_owned()), Some("tests".to_owned())),
        Utc::now(),
    )
    .on_resource("request-1")
    .with_states(
        Some(json!({"status": "PENDING"})),
        Some(json!({"status": "REJECTED"})),
    );

    assert!(writer.append_entry(entry.clone()).await.is_ok());
    assert!(writer.append_entry(entry.clone()).await.is_ok());

    let listed = reader
        .list_entries(AuditLogQuery {
            limit: 10,
            actor_id: Some(actor_id.clone()),
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_else(|error| panic!("audit entries should list: {error}"));

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, entry.id);
    assert_eq!(listed[0].actor_role, Some(Role::Owner));
    assert_eq!(listed[0].action, AuditAction::ApprovalRequestRejected);
    assert_eq!(listed[0].changed_fields, vec!["status".to_owned()]);
    assert_eq!(listed[0].ip_address.as_deref(), Some("10.1.2.3"));
}

#[tokio::test]
async fn listing_filters_by_action() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let writer = PostgresAuditRepository::new(pool.clone());
    let reader = PostgresAuditLogRepository::new(pool);
    let actor = Actor::new(format!("manager-{}", Uuid::new_v4()), Role::PmcManager);

    for action in [
        AuditAction::ApprovalRequestCreated,
        AuditAction::AccessDenied,
    ] {
        let entry = AuditEntry::for_actor(
            &actor,
            action,
            "approval_requests",
            &RequestContext::default(),
            Utc::now(),
        );
        assert!(writer.append_entry(entry).await.is_ok());
    }

    let denied = reader
        .list_entries(AuditLogQuery {
            limit: 10,
            action: Some(AuditAction::AccessDenied),
            actor_id: Some(actor.subject().to_owned()),
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_else(|error| panic!("audit entries should list: {error}"));

    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].action, AuditAction::AccessDenied);
}
