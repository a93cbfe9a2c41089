use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use leasehold_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalRequestId(Uuid);

impl ApprovalRequestId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ApprovalRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ApprovalRequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for ApprovalRequestId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self).map_err(|error| {
            AppError::Validation(format!("invalid approval request id '{value}': {error}"))
        })
    }
}

/// Closed set of delegated actions that need owner consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalType {
    /// Spending on the owner's behalf.
    Expense,
    /// Maintenance request escalation.
    MaintenanceRequest,
    /// Work order issuance.
    WorkOrder,
    /// Tenant-originated request.
    TenantRequest,
    /// Change to lease terms.
    LeaseModification,
    /// Vendor assignment.
    VendorAssignment,
    /// Contractor assignment.
    ContractorAssignment,
    /// Anything else.
    Other,
}

impl ApprovalType {
    /// Returns a stable storage value for this approval type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "EXPENSE",
            Self::MaintenanceRequest => "MAINTENANCE_REQUEST",
            Self::WorkOrder => "WORK_ORDER",
            Self::TenantRequest => "TENANT_REQUEST",
            Self::LeaseModification => "LEASE_MODIFICATION",
            Self::VendorAssignment => "VENDOR_ASSIGNMENT",
            Self::ContractorAssignment => "CONTRACTOR_ASSIGNMENT",
            Self::Other => "OTHER",
        }
    }
}

impl FromStr for ApprovalType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "EXPENSE" => Ok(Self::Expense),
            "MAINTENANCE_REQUEST" => Ok(Self::MaintenanceRequest),
            "WORK_ORDER" => Ok(Self::WorkOrder),
            "TENANT_REQUEST" => Ok(Self::TenantRequest),
            "LEASE_MODIFICATION" => Ok(Self::LeaseModification),
            "VENDOR_ASSIGNMENT" => Ok(Self::VendorAssignment),
            "CONTRACTOR_ASSIGNMENT" => Ok(Self::ContractorAssignment),
            "OTHER" => Ok(Self::Other),
            _ => Err(AppError::Validation(format!(
                "unknown approval type '{value}'"
            ))),
        }
    }
}

/// Approval request lifecycle status. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by the owner or a scoped delegate.
    Approved,
    /// Rejected by the owner or a scoped delegate.
    Rejected,
    /// Deadline passed without a decision.
    Expired,
}

impl ApprovalStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Returns whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for ApprovalStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown approval status '{value}'"
            ))),
        }
    }
}

/// Decision applied to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Grant consent.
    Approve,
    /// Refuse consent.
    Reject,
}

impl ApprovalDecision {
    /// Returns the terminal status this decision produces.
    #[must_use]
    pub fn target_status(&self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl FromStr for ApprovalDecision {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(AppError::Validation(format!(
                "unknown approval decision '{value}'"
            ))),
        }
    }
}

/// Validated input for a new approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequestDraft {
    /// Subject asking for consent.
    pub requested_by: String,
    /// Owner whose consent is required.
    pub owner_id: String,
    /// Kind of delegated action.
    pub approval_type: ApprovalType,
    /// Type of the entity the action targets.
    pub entity_type: String,
    /// Identifier of the targeted entity, when it already exists.
    pub entity_id: Option<String>,
    /// Short summary shown to the owner.
    pub title: String,
    /// Amount in minor currency units.
    pub amount_cents: Option<i64>,
    /// Longer explanation.
    pub description: Option<String>,
}

/// Delegated action awaiting or carrying an owner decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Stable request identifier.
    pub id: ApprovalRequestId,
    /// Subject that asked for consent.
    pub requested_by: String,
    /// Owner whose consent is required.
    pub owner_id: String,
    /// Kind of delegated action.
    pub approval_type: ApprovalType,
    /// Type of the entity the action targets.
    pub entity_type: String,
    /// Identifier of the targeted entity.
    pub entity_id: Option<String>,
    /// Short summary.
    pub title: String,
    /// Amount in minor currency units.
    pub amount_cents: Option<i64>,
    /// Longer explanation.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: ApprovalStatus,
    /// Subject that decided, or `system` for expiry.
    pub decided_by: Option<String>,
    /// Decision timestamp.
    pub decided_at: Option<DateTime<Utc>>,
    /// Decision deadline.
    pub expires_at: DateTime<Utc>,
    /// Accumulated decision notes.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Opens a pending request that expires `ttl` after `now`.
    pub fn open(draft: ApprovalRequestDraft, now: DateTime<Utc>, ttl: Duration) -> AppResult<Self> {
        if ttl <= Duration::zero() {
            return Err(AppError::Validation(
                "approval request ttl must be positive".to_owned(),
            ));
        }

        let title = NonEmptyString::new(draft.title.trim())
            .map_err(|_| AppError::Validation("approval request title is required".to_owned()))?;
        let entity_type = NonEmptyString::new(draft.entity_type.trim()).map_err(|_| {
            AppError::Validation("approval request entity_type is required".to_owned())
        })?;
        let requested_by = NonEmptyString::new(draft.requested_by).map_err(|_| {
            AppError::Validation("approval request requested_by is required".to_owned())
        })?;
        let owner_id = NonEmptyString::new(draft.owner_id).map_err(|_| {
            AppError::Validation("approval request owner_id is required".to_owned())
        })?;

        if draft.amount_cents.is_some_and(|amount| amount < 0) {
            return Err(AppError::Validation(
                "approval request amount must not be negative".to_owned(),
            ));
        }

        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            AppError::Validation(format!(
                "approval request ttl of {}h is out of range",
                ttl.num_hours()
            ))
        })?;

        Ok(Self {
            id: ApprovalRequestId::new(),
            requested_by: requested_by.into(),
            owner_id: owner_id.into(),
            approval_type: draft.approval_type,
            entity_type: entity_type.into(),
            entity_id: draft.entity_id.filter(|value| !value.trim().is_empty()),
            title: title.into(),
            amount_cents: draft.amount_cents,
            description: draft.description.filter(|value| !value.trim().is_empty()),
            status: ApprovalStatus::Pending,
            decided_by: None,
            decided_at: None,
            expires_at,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns whether the request is pending with a passed deadline.
    #[must_use]
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && self.expires_at <= now
    }

    /// Builds the transition recording a user decision.
    ///
    /// Expired and already-decided requests produce distinct conflicts so
    /// callers can tell "too late" from "already resolved".
    pub fn decide(
        &self,
        decision: ApprovalDecision,
        decided_by: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<ApprovalTransition> {
        match self.status {
            ApprovalStatus::Pending if self.expires_at <= now => Err(self.expired_conflict()),
            ApprovalStatus::Pending => Ok(ApprovalTransition {
                request_id: self.id,
                from: ApprovalStatus::Pending,
                to: decision.target_status(),
                decided_by: decided_by.to_owned(),
                decided_at: now,
                notes: append_notes(self.notes.as_deref(), notes),
            }),
            ApprovalStatus::Expired => Err(self.expired_conflict()),
            ApprovalStatus::Approved | ApprovalStatus::Rejected => {
                Err(self.already_decided_conflict())
            }
        }
    }

    /// Builds the transition recording expiry by the scheduler.
    pub fn expire(&self, now: DateTime<Utc>) -> AppResult<ApprovalTransition> {
        if !self.is_due_for_expiry(now) {
            return Err(AppError::Conflict(format!(
                "approval request '{}' is not due for expiry",
                self.id
            )));
        }

        Ok(ApprovalTransition {
            request_id: self.id,
            from: ApprovalStatus::Pending,
            to: ApprovalStatus::Expired,
            decided_by: crate::SYSTEM_ACTOR_ID.to_owned(),
            decided_at: now,
            notes: self.notes.clone(),
        })
    }

    /// Returns the request with a transition applied.
    #[must_use]
    pub fn apply(&self, transition: &ApprovalTransition) -> Self {
        Self {
            status: transition.to,
            decided_by: Some(transition.decided_by.clone()),
            decided_at: Some(transition.decided_at),
            notes: transition.notes.clone(),
            updated_at: transition.decided_at,
            ..self.clone()
        }
    }

    /// Conflict describing an already-decided request.
    #[must_use]
    pub fn already_decided_conflict(&self) -> AppError {
        AppError::Conflict(format!(
            "approval request '{}' was already decided ({})",
            self.id,
            self.status.as_str()
        ))
    }

    /// Conflict describing a request whose deadline passed.
    #[must_use]
    pub fn expired_conflict(&self) -> AppError {
        AppError::Conflict(format!(
            "approval request '{}' expired at {} and can no longer be decided",
            self.id,
            self.expires_at.to_rfc3339()
        ))
    }
}

/// Compare-and-set status change for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalTransition {
    /// Target request.
    pub request_id: ApprovalRequestId,
    /// Status the row must still hold for the write to apply.
    pub from: ApprovalStatus,
    /// New terminal status.
    pub to: ApprovalStatus,
    /// Deciding subject.
    pub decided_by: String,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
    /// Notes after appending the decision note.
    pub notes: Option<String>,
}

fn append_notes(existing: Option<&str>, added: Option<&str>) -> Option<String> {
    let added = added.map(str::trim).filter(|value| !value.is_empty());
    match (existing, added) {
        (Some(existing), Some(added)) => Some(format!("{existing}\n{added}")),
        (Some(existing), None) => Some(existing.to_owned()),
        (None, Some(added)) => Some(added.to_owned()),
        (None, None) => None,
    }
}
