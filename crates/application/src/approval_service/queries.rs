use super::*;

impl ApprovalService {
    /// Returns one request visible to the actor.
    pub async fn get_request(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
        context: &RequestContext,
    ) -> AppResult<ApprovalRequest> {
        self.require_read(actor, context).await?;
        let request = self.load_request(request_id, context).await?;

        if !self.can_view(actor, &request).await? {
            return Err(self
                .permission_checker
                .deny(
                    actor,
                    ResourceKind::ApprovalRequest,
                    Some(&request.id.to_string()),
                    format!(
                        "subject '{}' may not view approval request '{}'",
                        actor.subject(),
                        request.id
                    ),
                    context,
                )
                .await);
        }

        Ok(request)
    }

    /// Lists requests, narrowed to what the actor may see.
    ///
    /// Owners see requests addressed to them and managing-organization actors
    /// see requests they opened. Internal staff see everything.
    pub async fn list_requests(
        &self,
        actor: &Actor,
        query: ApprovalRequestQuery,
        context: &RequestContext,
    ) -> AppResult<Vec<ApprovalRequest>> {
        self.require_read(actor, context).await?;

        let mut query = ApprovalRequestQuery {
            limit: query.limit.clamp(1, MAX_REQUEST_PAGE_SIZE),
            ..query
        };
        match actor.kind() {
            ActorKind::Internal => {}
            ActorKind::Owner => query.owner_id = Some(actor.subject().to_owned()),
            ActorKind::ManagingOrganization | ActorKind::Tenant | ActorKind::Vendor => {
                query.requested_by = Some(actor.subject().to_owned());
            }
        }

        within_deadline(
            context,
            "list approval requests",
            self.repository.list_requests(query),
        )
        .await
    }

    async fn require_read(&self, actor: &Actor, context: &RequestContext) -> AppResult<()> {
        self.permission_checker
            .authorize(
                actor,
                &PermissionCheck::new(
                    PermissionCategory::Approvals,
                    ResourceKind::ApprovalRequest,
                    PermissionAction::Read,
                ),
                context,
            )
            .await
    }

    async fn can_view(&self, actor: &Actor, request: &ApprovalRequest) -> AppResult<bool> {
        if actor.kind() == ActorKind::Internal
            || actor.subject() == request.requested_by
            || self.can_decide(actor, request).await?
        {
            return Ok(true);
        }

        Ok(self
            .scope_resolver
            .resolve_owner_access(actor, &request.owner_id)
            .await?
            .is_some())
    }
}
