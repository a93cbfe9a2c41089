use super::*;

impl ApprovalService {
    /// Expires every pending request whose deadline is at or before `now`.
    ///
    /// Safe to run repeatedly and concurrently with decisions: rows decided in
    /// the meantime lose the compare-and-set and are left alone. Returns how
    /// many requests this call expired.
    ///
    /// The context deadline bounds each store round trip. Audit writes for
    /// applied transitions are bounded by the audit logger alone, so a row
    /// that reached `EXPIRED` always gets its audit attempt.
    pub async fn expire_due(
        &self,
        now: DateTime<Utc>,
        context: &RequestContext,
    ) -> AppResult<usize> {
        let audit_context = context.without_deadline();
        let batch_size = self.policy.expiry_batch_size.max(1);
        let mut expired = 0_usize;

        loop {
            let due = within_deadline(
                context,
                "list approval requests due for expiry",
                self.repository.list_due_for_expiry(now, batch_size),
            )
            .await?;
            if due.is_empty() {
                break;
            }

            let mut progressed = 0_usize;
            for request in &due {
                let Ok(transition) = request.expire(now) else {
                    continue;
                };

                let applied = within_deadline(
                    context,
                    "expire approval request",
                    self.repository.apply_transition(&transition),
                )
                .await;

                match applied {
                    Ok(Some(updated)) => {
                        progressed += 1;
                        self.audit_transition(None, Some(request), &updated, &audit_context)
                            .await;
                        self.publish(
                            &updated.requested_by,
                            NotificationKind::ApprovalExpired,
                            notification_payload(&updated),
                        )
                        .await;
                    }
                    Ok(None) => {}
                    Err(error) => {
                        warn!(
                            request_id = %request.id,
                            error = %error,
                            "failed to expire approval request"
                        );
                    }
                }
            }

            expired += progressed;
            if progressed == 0 || due.len() < batch_size {
                break;
            }
        }

        if expired > 0 {
            info!(expired, "expired overdue approval requests");
        }

        Ok(expired)
    }
}
