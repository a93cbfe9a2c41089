use std::sync::Arc;

use chrono::{DateTime, Utc};
use leasehold_core::AppResult;
use leasehold_domain::{AccessLevel, Actor, ActorKind, ManagingRelationship, PermissionContext};
use tracing::{error, warn};

use crate::{Clock, PermissionContextCache, RelationshipRepository};

/// Computes what an actor may edit given ownership and active management.
#[derive(Clone)]
pub struct ScopeResolver {
    relationships: Arc<dyn RelationshipRepository>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn PermissionContextCache>>,
    cache_ttl_seconds: u32,
}

impl ScopeResolver {
    /// Creates an uncached resolver.
    #[must_use]
    pub fn new(relationships: Arc<dyn RelationshipRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            relationships,
            clock,
            cache: None,
            cache_ttl_seconds: 0,
        }
    }

    /// Caches resolved owner contexts for `ttl_seconds`. Zero disables caching.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn PermissionContextCache>, ttl_seconds: u32) -> Self {
        self.cache = Some(cache);
        self.cache_ttl_seconds = ttl_seconds;
        self
    }

    /// Resolves the edit capabilities of an actor.
    pub async fn resolve_context(&self, actor: &Actor) -> AppResult<PermissionContext> {
        match actor.kind() {
            ActorKind::Internal => Ok(PermissionContext::full_access()),
            ActorKind::ManagingOrganization | ActorKind::Tenant | ActorKind::Vendor => {
                Ok(PermissionContext::view_only())
            }
            ActorKind::Owner => self.resolve_owner_context(actor.subject()).await,
        }
    }

    /// Returns the access level the actor holds over an owner's portfolio.
    pub async fn resolve_owner_access(
        &self,
        actor: &Actor,
        owner_id: &str,
    ) -> AppResult<Option<AccessLevel>> {
        if actor.is_super_admin() {
            return Ok(Some(AccessLevel::Manage));
        }

        match actor.kind() {
            ActorKind::Owner if actor.subject() == owner_id => Ok(Some(AccessLevel::Manage)),
            ActorKind::ManagingOrganization => {
                let Some(managing_org_id) = actor.managing_organization_id() else {
                    return Ok(None);
                };
                let relationship = self
                    .relationships
                    .find_active_relationship(managing_org_id, owner_id, self.clock.now())
                    .await?;
                Ok(relationship.map(|_| AccessLevel::Read))
            }
            _ => Ok(None),
        }
    }

    /// Drops the cached context of an owner after a relationship change.
    pub async fn invalidate_owner(&self, owner_id: &str) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(error) = cache.invalidate(&cache_key(owner_id)).await {
            warn!(owner_id, error = %error, "failed to invalidate permission context");
        }
    }

    async fn resolve_owner_context(&self, owner_id: &str) -> AppResult<PermissionContext> {
        let key = cache_key(owner_id);

        if self.cache_ttl_seconds > 0
            && let Some(cache) = &self.cache
        {
            match cache.get_context(&key).await {
                Ok(Some(context)) => return Ok(context),
                Ok(None) => {}
                Err(error) => {
                    warn!(owner_id, error = %error, "permission context cache read failed");
                }
            }
        }

        let now = self.clock.now();
        let mut active = self
            .relationships
            .list_active_relationships_for_owner(owner_id, now)
            .await?;
        let (context, ttl_seconds) = match select_relationship(owner_id, &mut active) {
            Some(relationship) => (
                PermissionContext::full_access().managed_by(relationship.managing_org_id.clone()),
                self.ttl_until(relationship.ended_at, now),
            ),
            None => (PermissionContext::full_access(), self.cache_ttl_seconds),
        };

        if ttl_seconds > 0
            && let Some(cache) = &self.cache
            && let Err(error) = cache.set_context(&key, &context, ttl_seconds).await
        {
            warn!(owner_id, error = %error, "permission context cache write failed");
        }

        Ok(context)
    }

    /// Cache lifetime that never outlives a scheduled relationship end.
    fn ttl_until(&self, ended_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
        let Some(ended_at) = ended_at else {
            return self.cache_ttl_seconds;
        };

        let remaining = u32::try_from((ended_at - now).num_seconds().max(0)).unwrap_or(u32::MAX);
        remaining.min(self.cache_ttl_seconds)
    }
}

/// Picks the governing relationship: earliest start, then organization id.
fn select_relationship<'a>(
    owner_id: &str,
    active: &'a mut [ManagingRelationship],
) -> Option<&'a ManagingRelationship> {
    active.sort_by(|left, right| {
        left.started_at
            .cmp(&right.started_at)
            .then_with(|| left.managing_org_id.cmp(&right.managing_org_id))
    });

    if active.len() > 1 {
        let organizations: Vec<&str> = active
            .iter()
            .map(|relationship| relationship.managing_org_id.as_str())
            .collect();
        error!(
            owner_id,
            ?organizations,
            "owner has overlapping active managing relationships"
        );
    }

    active.first()
}

fn cache_key(owner_id: &str) -> String {
    format!("owner:{owner_id}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Duration;
    use leasehold_domain::{AccessLevel, Actor, ManagingRelationship, PermissionContext, Role};

    use crate::test_support::TestHarness;

    #[tokio::test]
    async fn unmanaged_owner_has_full_access() {
        let harness = TestHarness::new();
        let context = harness
            .scope_resolver()
            .resolve_context(&Actor::new("o1", Role::Owner))
            .await;

        assert_eq!(context.ok(), Some(PermissionContext::full_access()));
    }

    #[tokio::test]
    async fn managed_owner_keeps_only_property_creation() {
        let harness = TestHarness::new();
        harness.seed_relationship("m1", "o1").await;

        let context = harness
            .scope_resolver()
            .resolve_context(&Actor::new("o1", Role::Owner))
            .await
            .unwrap_or_else(|error| panic!("context should resolve: {error}"));

        assert!(context.is_managed);
        assert_eq!(context.managing_org.as_deref(), Some("m1"));
        assert!(context.can_add_properties);
        assert!(!context.can_edit);
        assert!(!context.can_edit_properties);
        assert!(!context.can_edit_tenants);
        assert!(!context.can_edit_leases);
        assert!(!context.can_edit_maintenance);
    }

    #[tokio::test]
    async fn relationship_ended_in_the_past_is_ignored() {
        let harness = TestHarness::new();
        let mut relationship =
            ManagingRelationship::start("m1", "o1", harness.now() - Duration::days(60))
                .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
        relationship.ended_at = Some(harness.now() - Duration::days(1));
        harness.relationships.insert_raw(relationship).await;

        let context = harness
            .scope_resolver()
            .resolve_context(&Actor::new("o1", Role::Owner))
            .await
            .unwrap_or_else(|error| panic!("context should resolve: {error}"));

        assert!(!context.is_managed);
        assert!(context.can_edit);
    }

    #[tokio::test]
    async fn managing_organization_actor_is_view_only() {
        let harness = TestHarness::new();
        harness.seed_relationship("m1", "o1").await;

        let context = harness
            .scope_resolver()
            .resolve_context(&Actor::new("m1-manager", Role::PmcManager).with_organization("m1"))
            .await;

        assert_eq!(context.ok(), Some(PermissionContext::view_only()));
    }

    #[tokio::test]
    async fn overlapping_relationships_resolve_to_earliest() {
        let harness = TestHarness::new();
        for (org, days_ago) in [("m2", 10), ("m1", 40)] {
            let relationship =
                ManagingRelationship::start(org, "o1", harness.now() - Duration::days(days_ago))
                    .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
            harness.relationships.insert_raw(relationship).await;
        }

        let context = harness
            .scope_resolver()
            .resolve_context(&Actor::new("o1", Role::Owner))
            .await
            .unwrap_or_else(|error| panic!("context should resolve: {error}"));

        assert_eq!(context.managing_org.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn owner_access_levels() {
        let harness = TestHarness::new();
        harness.seed_relationship("m1", "o1").await;
        let resolver = harness.scope_resolver();

        let manager = Actor::new("m1-manager", Role::PmcManager).with_organization("m1");
        let stranger = Actor::new("m2-manager", Role::PmcManager).with_organization("m2");

        assert_eq!(
            resolver
                .resolve_owner_access(&Actor::new("o1", Role::Owner), "o1")
                .await
                .ok(),
            Some(Some(AccessLevel::Manage))
        );
        assert_eq!(
            resolver
                .resolve_owner_access(&Actor::new("o2", Role::Owner), "o1")
                .await
                .ok(),
            Some(None)
        );
        assert_eq!(
            resolver.resolve_owner_access(&manager, "o1").await.ok(),
            Some(Some(AccessLevel::Read))
        );
        assert_eq!(
            resolver.resolve_owner_access(&stranger, "o1").await.ok(),
            Some(None)
        );
        assert_eq!(
            resolver
                .resolve_owner_access(&Actor::new("root", Role::SuperAdmin), "o1")
                .await
                .ok(),
            Some(Some(AccessLevel::Manage))
        );
    }

    #[tokio::test]
    async fn cached_context_is_reused_until_invalidated() {
        let harness = TestHarness::new().with_cache();
        let resolver = harness.scope_resolver();
        let owner = Actor::new("o1", Role::Owner);

        let first = resolver.resolve_context(&owner).await.ok();
        harness.seed_relationship("m1", "o1").await;
        let cached = resolver.resolve_context(&owner).await.ok();
        assert_eq!(first, cached);

        resolver.invalidate_owner("o1").await;
        let refreshed = resolver
            .resolve_context(&owner)
            .await
            .unwrap_or_else(|error| panic!("context should resolve: {error}"));
        assert!(refreshed.is_managed);

        let hits = harness
            .cache
            .as_ref()
            .map(|cache| cache.hits.load(Ordering::SeqCst));
        assert_eq!(hits, Some(1));
    }

    #[tokio::test]
    async fn cached_managed_context_expires_with_scheduled_end() {
        let harness = TestHarness::new().with_cache();
        let mut ending_soon =
            ManagingRelationship::start("m1", "o1", harness.now() - Duration::days(60))
                .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
        ending_soon.ended_at = Some(harness.now() + Duration::seconds(10));
        harness.relationships.insert_raw(ending_soon).await;
        let mut ending_later =
            ManagingRelationship::start("m2", "o2", harness.now() - Duration::days(60))
                .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
        ending_later.ended_at = Some(harness.now() + Duration::days(1));
        harness.relationships.insert_raw(ending_later).await;
        let resolver = harness.scope_resolver();

        for owner_id in ["o1", "o2"] {
            let context = resolver
                .resolve_context(&Actor::new(owner_id, Role::Owner))
                .await
                .unwrap_or_else(|error| panic!("context should resolve: {error}"));
            assert!(context.is_managed);
        }

        let ttls = match &harness.cache {
            Some(cache) => cache.ttls.lock().await.clone(),
            None => Vec::new(),
        };
        assert_eq!(ttls, vec![10, 30]);
    }
}
