use std::sync::Arc;

use chrono::{DateTime, Utc};
use leasehold_core::{AppError, AppResult, RequestContext};
use leasehold_domain::{
    Actor, ActorKind, AuditAction, ManagingRelationship, PermissionAction, PermissionCategory,
    ResourceKind,
};
use tracing::info;
use uuid::Uuid;

use crate::deadline::within_deadline;
use crate::permission_checker::{PermissionCheck, PermissionChecker};
use crate::{AuditEntry, AuditLogger, Clock, RelationshipRepository, ScopeResolver};

/// Administration of owner and managing-organization links.
#[derive(Clone)]
pub struct RelationshipService {
    permission_checker: PermissionChecker,
    scope_resolver: ScopeResolver,
    repository: Arc<dyn RelationshipRepository>,
    audit_logger: AuditLogger,
    clock: Arc<dyn Clock>,
}

impl RelationshipService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        permission_checker: PermissionChecker,
        scope_resolver: ScopeResolver,
        repository: Arc<dyn RelationshipRepository>,
        audit_logger: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            permission_checker,
            scope_resolver,
            repository,
            audit_logger,
            clock,
        }
    }

    /// Starts managing `owner_id` on behalf of `managing_org_id`.
    pub async fn start(
        &self,
        actor: &Actor,
        managing_org_id: &str,
        owner_id: &str,
        context: &RequestContext,
    ) -> AppResult<ManagingRelationship> {
        self.require(actor, PermissionAction::Create, None, context)
            .await?;

        let now = self.clock.now();
        let relationship = ManagingRelationship::start(managing_org_id, owner_id, now)?;

        if within_deadline(
            context,
            "find active relationship",
            self.repository
                .find_active_relationship(managing_org_id, owner_id, now),
        )
        .await?
        .is_some()
        {
            return Err(AppError::Conflict(format!(
                "'{managing_org_id}' already manages owner '{owner_id}'"
            )));
        }

        within_deadline(
            context,
            "start relationship",
            self.repository.start_relationship(relationship.clone()),
        )
        .await?;

        info!(
            relationship_id = %relationship.relationship_id,
            managing_org_id,
            owner_id,
            "managing relationship started"
        );

        self.audit(
            actor,
            AuditAction::RelationshipStarted,
            None,
            &relationship,
            context,
        )
        .await;
        self.scope_resolver.invalidate_owner(owner_id).await;

        Ok(relationship)
    }

    /// Ends a relationship. The row is kept with status `ended`.
    pub async fn end(
        &self,
        actor: &Actor,
        relationship_id: Uuid,
        ended_at: Option<DateTime<Utc>>,
        context: &RequestContext,
    ) -> AppResult<ManagingRelationship> {
        let relationship = within_deadline(
            context,
            "find relationship",
            self.repository.find_relationship(relationship_id),
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("managing relationship '{relationship_id}' not found"))
        })?;

        self.require(actor, PermissionAction::Update, Some(&relationship), context)
            .await?;

        let now = self.clock.now();
        let ended_at = ended_at.unwrap_or(now);
        if ended_at > now {
            return Err(AppError::Validation(
                "relationship ended_at must not be in the future".to_owned(),
            ));
        }
        let ended = relationship.end(ended_at)?;

        if !within_deadline(
            context,
            "end relationship",
            self.repository.mark_relationship_ended(&ended),
        )
        .await?
        {
            return Err(AppError::Conflict(format!(
                "managing relationship '{relationship_id}' has already ended"
            )));
        }

        info!(
            relationship_id = %ended.relationship_id,
            owner_id = %ended.owner_id,
            "managing relationship ended"
        );

        self.audit(
            actor,
            AuditAction::RelationshipEnded,
            Some(&relationship),
            &ended,
            context,
        )
        .await;
        self.scope_resolver.invalidate_owner(&ended.owner_id).await;

        Ok(ended)
    }

    /// Lists an owner's relationship history, newest first.
    pub async fn list_for_owner(
        &self,
        actor: &Actor,
        owner_id: &str,
        context: &RequestContext,
    ) -> AppResult<Vec<ManagingRelationship>> {
        self.require(actor, PermissionAction::Read, None, context)
            .await?;

        if actor.kind() == ActorKind::Owner && actor.subject() != owner_id {
            return Err(self
                .permission_checker
                .deny(
                    actor,
                    ResourceKind::ManagingRelationship,
                    None,
                    format!(
                        "subject '{}' may not list relationships of owner '{owner_id}'",
                        actor.subject()
                    ),
                    context,
                )
                .await);
        }

        let relationships = within_deadline(
            context,
            "list relationships",
            self.repository.list_relationships_for_owner(owner_id),
        )
        .await?;

        Ok(match actor.managing_organization_id() {
            Some(organization_id) => relationships
                .into_iter()
                .filter(|relationship| relationship.managing_org_id == organization_id)
                .collect(),
            None => relationships,
        })
    }

    /// Checks the grant and, for a concrete row, that owners and managing
    /// organizations only touch their own relationships.
    async fn require(
        &self,
        actor: &Actor,
        action: PermissionAction,
        relationship: Option<&ManagingRelationship>,
        context: &RequestContext,
    ) -> AppResult<()> {
        let mut check = PermissionCheck::new(
            PermissionCategory::Administration,
            ResourceKind::ManagingRelationship,
            action,
        );
        if let Some(relationship) = relationship {
            check = check.on(relationship.relationship_id.to_string());
        }
        self.permission_checker
            .authorize(actor, &check, context)
            .await?;

        let Some(relationship) = relationship else {
            return Ok(());
        };
        let is_party = match actor.kind() {
            ActorKind::Owner => actor.subject() == relationship.owner_id,
            ActorKind::ManagingOrganization => {
                actor.managing_organization_id() == Some(relationship.managing_org_id.as_str())
            }
            ActorKind::Internal | ActorKind::Tenant | ActorKind::Vendor => true,
        };
        if is_party {
            return Ok(());
        }

        Err(self
            .permission_checker
            .deny(
                actor,
                ResourceKind::ManagingRelationship,
                Some(&relationship.relationship_id.to_string()),
                format!(
                    "subject '{}' is not a party to relationship '{}'",
                    actor.subject(),
                    relationship.relationship_id
                ),
                context,
            )
            .await)
    }

    async fn audit(
        &self,
        actor: &Actor,
        action: AuditAction,
        before: Option<&ManagingRelationship>,
        after: &ManagingRelationship,
        context: &RequestContext,
    ) {
        let entry = AuditEntry::for_actor(
            actor,
            action,
            ResourceKind::ManagingRelationship.as_str(),
            context,
            self.clock.now(),
        )
        .on_resource(after.relationship_id.to_string())
        .with_states(
            before.and_then(|relationship| serde_json::to_value(relationship).ok()),
            serde_json::to_value(after).ok(),
        );

        self.audit_logger.record(entry, context).await;
    }
}
