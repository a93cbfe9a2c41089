use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use leasehold_core::{AppError, AppResult, RequestContext};
use leasehold_domain::{
    AccessLevel, Actor, ActorKind, ApprovalDecision, ApprovalRequest, ApprovalRequestDraft,
    ApprovalRequestId, ApprovalStatus, ApprovalType, AuditAction, PermissionAction,
    PermissionCategory, ResourceKind,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::deadline::within_deadline;
use crate::permission_checker::{PermissionCheck, PermissionChecker};
use crate::{
    ApprovalPolicy, ApprovalRequestQuery, ApprovalRequestRepository, AuditEntry, AuditLogger,
    BulkDecisionFailure, BulkDecisionResult, Clock, CreateApprovalRequestInput, Notification,
    NotificationKind, NotificationPublisher, ScopeResolver,
};

mod bulk;
mod create;
mod decide;
mod expiry;
mod queries;


const MAX_REQUEST_PAGE_SIZE: usize = 500;

/// Owner-consent workflow for delegated actions.
#[derive(Clone)]
pub struct ApprovalService {
    permission_checker: PermissionChecker,
    scope_resolver: ScopeResolver,
    repository: Arc<dyn ApprovalRequestRepository>,
    audit_logger: AuditLogger,
    notifier: Arc<dyn NotificationPublisher>,
    clock: Arc<dyn Clock>,
    policy: ApprovalPolicy,
}

impl ApprovalService {
    /// Creates an approval service from required dependencies.
    #[must_use]
    pub fn new(
        permission_checker: PermissionChecker,
        scope_resolver: ScopeResolver,
        repository: Arc<dyn ApprovalRequestRepository>,
        audit_logger: AuditLogger,
        notifier: Arc<dyn NotificationPublisher>,
        clock: Arc<dyn Clock>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            permission_checker,
            scope_resolver,
            repository,
            audit_logger,
            notifier,
            clock,
            policy,
        }
    }

    async fn load_request(
        &self,
        request_id: ApprovalRequestId,
        context: &RequestContext,
    ) -> AppResult<ApprovalRequest> {
        within_deadline(
            context,
            "find approval request",
            self.repository.find_request(request_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("approval request '{request_id}' not found")))
    }

    /// Owner, super admin, or a write scope on the owner or the request.
    async fn can_decide(&self, actor: &Actor, request: &ApprovalRequest) -> AppResult<bool> {
        if actor.subject() == request.owner_id
            || self.permission_checker.is_super_admin(actor).await?
        {
            return Ok(true);
        }

        let on_owner = self
            .permission_checker
            .scoped_access_level(actor.subject(), ResourceKind::Owner, &request.owner_id)
            .await?;
        let on_request = self
            .permission_checker
            .scoped_access_level(
                actor.subject(),
                ResourceKind::ApprovalRequest,
                &request.id.to_string(),
            )
            .await?;

        Ok(on_owner
            .max(on_request)
            .is_some_and(|level| level.satisfies(AccessLevel::Write)))
    }

    async fn deny_decision(
        &self,
        actor: &Actor,
        request: &ApprovalRequest,
        context: &RequestContext,
    ) -> AppError {
        self.permission_checker
            .deny(
                actor,
                ResourceKind::ApprovalRequest,
                Some(&request.id.to_string()),
                format!(
                    "subject '{}' may not decide approval request '{}'",
                    actor.subject(),
                    request.id
                ),
                context,
            )
            .await
    }

    async fn audit_transition(
        &self,
        actor: Option<&Actor>,
        before: Option<&ApprovalRequest>,
        after: &ApprovalRequest,
        context: &RequestContext,
    ) {
        let action = AuditAction::for_approval_status(after.status);
        let resource_type = ResourceKind::ApprovalRequest.as_str();
        let now = self.clock.now();
        let entry = match actor {
            Some(actor) => AuditEntry::for_actor(actor, action, resource_type, context, now),
            None => AuditEntry::for_system(action, resource_type, context, now),
        }
        .on_resource(after.id.to_string())
        .with_states(before.and_then(snapshot), snapshot(after));

        self.audit_logger.record(entry, context).await;
    }

    /// Hands a notification to the outbox. Failures never affect the caller.
    async fn publish(&self, recipient_id: &str, kind: NotificationKind, payload: Value) {
        let notification = Notification {
            recipient_id: recipient_id.to_owned(),
            kind,
            payload,
        };

        if let Err(error) = self.notifier.notify(notification).await {
            warn!(
                recipient_id,
                kind = kind.as_str(),
                error = %error,
                "failed to enqueue approval notification"
            );
        }
    }
}

fn snapshot(request: &ApprovalRequest) -> Option<Value> {
    serde_json::to_value(request).ok()
}

fn notification_payload(request: &ApprovalRequest) -> Value {
    json!({
        "request_id": request.id.to_string(),
        "approval_type": request.approval_type.as_str(),
        "title": request.title,
        "amount_cents": request.amount_cents,
        "status": request.status.as_str(),
        "requested_by": request.requested_by,
        "owner_id": request.owner_id,
        "decided_by": request.decided_by,
        "expires_at": request.expires_at.to_rfc3339(),
    })
}
