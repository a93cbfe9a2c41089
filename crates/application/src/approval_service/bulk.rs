use super::*;

impl ApprovalService {
    /// Applies one decision to many requests, row by row.
    ///
    /// Missing and no-longer-pending requests are skipped. Requests the actor
    /// may not decide, and rows the store failed on, are reported as failed.
    /// Partial failure never fails the call.
    pub async fn bulk_decide(
        &self,
        actor: &Actor,
        request_ids: &[ApprovalRequestId],
        decision: ApprovalDecision,
        notes: Option<&str>,
        context: &RequestContext,
    ) -> AppResult<BulkDecisionResult> {
        if request_ids.len() > self.policy.max_bulk_size {
            return Err(AppError::Validation(format!(
                "bulk decision accepts at most {} requests, got {}",
                self.policy.max_bulk_size,
                request_ids.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut result = BulkDecisionResult::default();

        for request_id in request_ids
            .iter()
            .copied()
            .filter(|request_id| seen.insert(*request_id))
        {
            match self
                .decide_one(actor, request_id, decision, notes, context)
                .await
            {
                Ok(true) => result.succeeded.push(request_id),
                Ok(false) => result.skipped.push(request_id),
                Err(error) => result.failed.push(BulkDecisionFailure {
                    request_id,
                    reason: error.to_string(),
                }),
            }
        }

        info!(
            decided_by = actor.subject(),
            decision = decision.target_status().as_str(),
            succeeded = result.succeeded.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            "bulk approval decision applied"
        );

        Ok(result)
    }

    /// Returns `Ok(true)` when transitioned and `Ok(false)` when skipped.
    async fn decide_one(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
        decision: ApprovalDecision,
        notes: Option<&str>,
        context: &RequestContext,
    ) -> AppResult<bool> {
        let Some(request) = within_deadline(
            context,
            "find approval request",
            self.repository.find_request(request_id),
        )
        .await?
        else {
            return Ok(false);
        };

        if request.status != ApprovalStatus::Pending {
            return Ok(false);
        }

        if !self.can_decide(actor, &request).await? {
            return Err(self.deny_decision(actor, &request, context).await);
        }

        let Ok(transition) = request.decide(decision, actor.subject(), notes, self.clock.now())
        else {
            return Ok(false);
        };

        let Some(updated) = within_deadline(
            context,
            "apply approval transition",
            self.repository.apply_transition(&transition),
        )
        .await?
        else {
            return Ok(false);
        };

        self.audit_transition(Some(actor), Some(&request), &updated, context)
            .await;
        self.publish(
            &updated.requested_by,
            NotificationKind::ApprovalDecided,
            notification_payload(&updated),
        )
        .await;

        Ok(true)
    }
}
