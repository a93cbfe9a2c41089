use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use leasehold_core::{AppError, AppResult, RequestContext};
use leasehold_domain::{Actor, PermissionAction, PermissionCategory, ResourceKind};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::permission_checker::{PermissionCheck, PermissionChecker};
use crate::{AuditEntry, AuditFailurePolicy, AuditLogQuery, AuditLogRepository, AuditRepository};

const MAX_AUDIT_PAGE_SIZE: usize = 500;
const DEFAULT_APPEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Append-only audit writer that never fails its caller.
///
/// Every append is bounded by the logger's append timeout, narrowed further by
/// the caller's deadline. A timed-out append counts as a store failure.
#[derive(Clone)]
pub struct AuditLogger {
    repository: Arc<dyn AuditRepository>,
    policy: AuditFailurePolicy,
    append_timeout: Duration,
    buffer: Arc<Mutex<VecDeque<AuditEntry>>>,
}

impl AuditLogger {
    /// Creates a logger writing through the repository.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>, policy: AuditFailurePolicy) -> Self {
        Self {
            repository,
            policy,
            append_timeout: DEFAULT_APPEND_TIMEOUT,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Overrides the upper bound for one append.
    #[must_use]
    pub fn with_append_timeout(mut self, append_timeout: Duration) -> Self {
        self.append_timeout = append_timeout;
        self
    }

    /// Appends one entry.
    ///
    /// Store failures and timeouts are logged and handled by the failure
    /// policy; they are never returned to the caller. Buffered entries are
    /// only retried by [`AuditLogger::flush`].
    pub async fn record(&self, entry: AuditEntry, context: &RequestContext) {
        let bound = context
            .deadline()
            .map_or(self.append_timeout, |deadline| deadline.min(self.append_timeout));

        if let Err(error) = self.append_bounded(entry.clone(), bound).await {
            self.handle_failure(entry, &error).await;
        }
    }

    /// Retries buffered entries in order and returns how many were written.
    ///
    /// Stops at the first failure and keeps the remaining entries.
    pub async fn flush(&self) -> usize {
        let mut buffer = self.buffer.lock().await;
        let mut written = 0_usize;

        while let Some(entry) = buffer.pop_front() {
            if let Err(error) = self.append_bounded(entry.clone(), self.append_timeout).await {
                debug!(
                    audit_entry_id = %entry.id,
                    error = %error,
                    "audit store still unavailable, keeping buffered entries"
                );
                buffer.push_front(entry);
                break;
            }
            written += 1;
        }

        written
    }

    /// Number of entries waiting for a retry.
    pub async fn buffered_len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    async fn append_bounded(&self, entry: AuditEntry, bound: Duration) -> AppResult<()> {
        tokio::time::timeout(bound, self.repository.append_entry(entry))
            .await
            .map_err(|_| {
                AppError::DeadlineExceeded(format!(
                    "audit append did not complete within {}ms",
                    bound.as_millis()
                ))
            })?
    }

    async fn handle_failure(&self, entry: AuditEntry, error: &AppError) {
        let entry_id = entry.id;
        let action = entry.action.as_str();

        match self.policy {
            AuditFailurePolicy::Drop => {
                warn!(
                    audit_entry_id = %entry_id,
                    action,
                    error = %error,
                    "dropping audit entry after store failure"
                );
            }
            AuditFailurePolicy::Buffer { capacity } => {
                if capacity == 0 {
                    warn!(
                        audit_entry_id = %entry_id,
                        action,
                        error = %error,
                        "dropping audit entry, buffer capacity is zero"
                    );
                    return;
                }

                let mut buffer = self.buffer.lock().await;
                while buffer.len() >= capacity {
                    if let Some(dropped) = buffer.pop_front() {
                        warn!(
                            audit_entry_id = %dropped.id,
                            action = dropped.action.as_str(),
                            "audit buffer full, dropping oldest entry"
                        );
                    }
                }
                buffer.push_back(entry);
                warn!(
                    audit_entry_id = %entry_id,
                    action,
                    buffered = buffer.len(),
                    error = %error,
                    "buffered audit entry after store failure"
                );
            }
        }
    }
}

/// Read side of the audit trail for reporting and export.
#[derive(Clone)]
pub struct AuditQueryService {
    permission_checker: PermissionChecker,
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditQueryService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        permission_checker: PermissionChecker,
        repository: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self {
            permission_checker,
            repository,
        }
    }

    /// Returns recent audit entries for actors allowed to read the trail.
    pub async fn list_entries(
        &self,
        actor: &Actor,
        query: AuditLogQuery,
        context: &RequestContext,
    ) -> AppResult<Vec<AuditEntry>> {
        self.permission_checker
            .authorize(
                actor,
                &PermissionCheck::new(
                    PermissionCategory::Administration,
                    ResourceKind::AuditLog,
                    PermissionAction::Read,
                ),
                context,
            )
            .await?;

        let query = AuditLogQuery {
            limit: query.limit.clamp(1, MAX_AUDIT_PAGE_SIZE),
            ..query
        };

        crate::deadline::within_deadline(
            context,
            "list audit entries",
            self.repository.list_entries(query),
        )
        .await
    }
}
