use chrono::{Duration, Utc};
use leasehold_application::{ApprovalRequestQuery, ApprovalRequestRepository};
use leasehold_domain::{
    ApprovalDecision, ApprovalRequest, ApprovalRequestDraft, ApprovalStatus, ApprovalType,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresApprovalRequestRepository;

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
        panic!("failed to run migrations for postgres approval tests: {error}");
    }

    Some(pool)
}

fn draft(owner_id: &str) -> ApprovalRequestDraft {
    ApprovalRequestDraft {
        requested_by: "m1-manager".to_owned(),
        owner_id: owner_id.to_owned(),
        approval_type: ApprovalType::Expense,
        entity_type: "expense".to_owned(),
        entity_id: Some("exp-1".to_owned()),
        title: "Roof repair".to_owned(),
        amount_cents: Some(50_000),
        description: None,
    }
}

#[tokio::test]
async fn transition_is_compare_and_set() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresApprovalRequestRepository::new(pool);
    let owner_id = format!("owner-{}", Uuid::new_v4());
    let now = Utc::now();
    let request = ApprovalRequest::open(draft(&owner_id), now, Duration::days(7))
        .unwrap_or_else(|error| panic!("request should open: {error}"));
    assert!(repository.insert_request(request.clone()).await.is_ok());

    let reject = request
        .decide(ApprovalDecision::Reject, &owner_id, Some("too costly"), now)
        .unwrap_or_else(|error| panic!("transition should build: {error}"));
    let approve = request
        .decide(ApprovalDecision::Approve, &owner_id, None, now)
        .unwrap_or_else(|error| panic!("transition should build: {error}"));

    let won = repository
        .apply_transition(&reject)
        .await
        .unwrap_or_else(|error| panic!("transition should apply: {error}"));
    let lost = repository
        .apply_transition(&approve)
        .await
        .unwrap_or_else(|error| panic!("transition should run: {error}"));

    assert_eq!(
        won.as_ref().map(|request| request.status),
        Some(ApprovalStatus::Rejected)
    );
    assert_eq!(
        won.and_then(|request| request.notes),
        Some("too costly".to_owned())
    );
    assert!(lost.is_none());

    let stored = repository
        .find_request(request.id)
        .await
        .unwrap_or_else(|error| panic!("request should load: {error}"));
    assert_eq!(
        stored.map(|request| request.status),
        Some(ApprovalStatus::Rejected)
    );
}

#[tokio::test]
async fn due_requests_and_filtered_listing() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresApprovalRequestRepository::new(pool);
    let owner_id = format!("owner-{}", Uuid::new_v4());
    let now = Utc::now();
    let overdue = ApprovalRequest::open(draft(&owner_id), now - Duration::days(8), Duration::days(7))
        .unwrap_or_else(|error| panic!("request should open: {error}"));
    let fresh = ApprovalRequest::open(draft(&owner_id), now, Duration::days(7))
        .unwrap_or_else(|error| panic!("request should open: {error}"));
    assert!(repository.insert_request(overdue.clone()).await.is_ok());
    assert!(repository.insert_request(fresh.clone()).await.is_ok());

    let due = repository
        .list_due_for_expiry(now, 1_000)
        .await
        .unwrap_or_else(|error| panic!("due requests should list: {error}"));
    assert!(due.iter().any(|request| request.id == overdue.id));
    assert!(due.iter().all(|request| request.id != fresh.id));

    let listed = repository
        .list_requests(ApprovalRequestQuery {
            owner_id: Some(owner_id.clone()),
            status: Some(ApprovalStatus::Pending),
            limit: 10,
            ..ApprovalRequestQuery::default()
        })
        .await
        .unwrap_or_else(|error| panic!("requests should list: {error}"));
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, fresh.id);
    assert_eq!(listed[1].amount_cents, Some(50_000));
}
