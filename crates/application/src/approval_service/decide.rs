use super::*;

impl ApprovalService {
    /// Approves or rejects one pending request.
    ///
    /// Fails with `NotFound` for unknown ids, `Forbidden` when the actor may
    /// not decide for the owner, and `Conflict` when the request is no longer
    /// pending or its deadline has passed.
    pub async fn decide(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
        decision: ApprovalDecision,
        notes: Option<&str>,
        context: &RequestContext,
    ) -> AppResult<ApprovalRequest> {
        let request = self.load_request(request_id, context).await?;

        if !self.can_decide(actor, &request).await? {
            return Err(self.deny_decision(actor, &request, context).await);
        }

        let transition = request.decide(decision, actor.subject(), notes, self.clock.now())?;
        let updated = within_deadline(
            context,
            "apply approval transition",
            self.repository.apply_transition(&transition),
        )
        .await?;

        let Some(updated) = updated else {
            // Lost the compare-and-set; report what the winner left behind.
            let current = self.load_request(request_id, context).await?;
            return Err(match current.status {
                ApprovalStatus::Expired => current.expired_conflict(),
                _ => current.already_decided_conflict(),
            });
        };

        info!(
            request_id = %updated.id,
            status = updated.status.as_str(),
            decided_by = actor.subject(),
            "approval request decided"
        );

        self.audit_transition(Some(actor), Some(&request), &updated, context)
            .await;
        self.publish(
            &updated.requested_by,
            NotificationKind::ApprovalDecided,
            notification_payload(&updated),
        )
        .await;

        Ok(updated)
    }
}
