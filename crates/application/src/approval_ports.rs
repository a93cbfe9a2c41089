use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::AppResult;
use leasehold_domain::{ApprovalRequest, ApprovalRequestId, ApprovalStatus, ApprovalTransition};

/// Repository port for approval requests.
#[async_trait]
pub trait ApprovalRequestRepository: Send + Sync {
    /// Stores a new request.
    async fn insert_request(&self, request: ApprovalRequest) -> AppResult<()>;

    /// Finds one request by id.
    async fn find_request(&self, request_id: ApprovalRequestId)
    -> AppResult<Option<ApprovalRequest>>;

    /// Applies a transition when the row still holds `transition.from`.
    ///
    /// Returns the updated request, or `None` when the compare-and-set lost.
    async fn apply_transition(
        &self,
        transition: &ApprovalTransition,
    ) -> AppResult<Option<ApprovalRequest>>;

    /// Lists pending requests whose deadline is at or before `now`.
    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<ApprovalRequest>>;

    /// Lists requests matching a filter, newest first.
    async fn list_requests(&self, query: ApprovalRequestQuery) -> AppResult<Vec<ApprovalRequest>>;
}

/// Filter for approval request listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApprovalRequestQuery {
    /// Owner filter.
    pub owner_id: Option<String>,
    /// Requester filter.
    pub requested_by: Option<String>,
    /// Status filter.
    pub status: Option<ApprovalStatus>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

/// Boundary input for opening an approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateApprovalRequestInput {
    /// Owner whose consent is required.
    pub owner_id: String,
    /// Approval type as received from the caller.
    pub approval_type: String,
    /// Type of the targeted entity.
    pub entity_type: String,
    /// Identifier of the targeted entity.
    pub entity_id: Option<String>,
    /// Short summary.
    pub title: String,
    /// Amount in minor currency units.
    pub amount_cents: Option<i64>,
    /// Longer explanation.
    pub description: Option<String>,
}

/// One item a bulk decision could not transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkDecisionFailure {
    /// Affected request.
    pub request_id: ApprovalRequestId,
    /// Human-readable reason.
    pub reason: String,
}

/// Per-item outcome of a bulk decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkDecisionResult {
    /// Requests moved to the decided status.
    pub succeeded: Vec<ApprovalRequestId>,
    /// Requests missing or no longer pending.
    pub skipped: Vec<ApprovalRequestId>,
    /// Requests the decider could not transition.
    pub failed: Vec<BulkDecisionFailure>,
}

impl BulkDecisionResult {
    /// Number of requests actually transitioned.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }
}
