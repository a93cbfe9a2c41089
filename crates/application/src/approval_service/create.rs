use super::*;

impl ApprovalService {
    /// Opens a pending request on behalf of a managing organization.
    ///
    /// The requester needs the create grant and owner access for
    /// `input.owner_id`. The owner is notified once the request is stored.
    pub async fn create_request(
        &self,
        actor: &Actor,
        input: CreateApprovalRequestInput,
        context: &RequestContext,
    ) -> AppResult<ApprovalRequest> {
        let approval_type: ApprovalType = input.approval_type.parse()?;
        let request = ApprovalRequest::open(
            ApprovalRequestDraft {
                requested_by: actor.subject().to_owned(),
                owner_id: input.owner_id,
                approval_type,
                entity_type: input.entity_type,
                entity_id: input.entity_id,
                title: input.title,
                amount_cents: input.amount_cents,
                description: input.description,
            },
            self.clock.now(),
            self.policy.request_ttl,
        )?;

        self.permission_checker
            .authorize(
                actor,
                &PermissionCheck::new(
                    PermissionCategory::Approvals,
                    ResourceKind::ApprovalRequest,
                    PermissionAction::Create,
                ),
                context,
            )
            .await?;

        if !self.permission_checker.is_super_admin(actor).await?
            && self
                .scope_resolver
                .resolve_owner_access(actor, &request.owner_id)
                .await?
                .is_none()
        {
            return Err(self
                .permission_checker
                .deny(
                    actor,
                    ResourceKind::Owner,
                    Some(&request.owner_id),
                    format!(
                        "subject '{}' does not manage owner '{}'",
                        actor.subject(),
                        request.owner_id
                    ),
                    context,
                )
                .await);
        }

        within_deadline(
            context,
            "insert approval request",
            self.repository.insert_request(request.clone()),
        )
        .await?;

        info!(
            request_id = %request.id,
            owner_id = %request.owner_id,
            requested_by = %request.requested_by,
            approval_type = request.approval_type.as_str(),
            "approval request opened"
        );

        self.audit_transition(Some(actor), None, &request, context)
            .await;
        self.publish(
            &request.owner_id,
            NotificationKind::ApprovalRequested,
            notification_payload(&request),
        )
        .await;

        Ok(request)
    }
}
