use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use leasehold_core::{AppError, AppResult};
use leasehold_domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalStatus, ApprovalTransition, ManagingRelationship,
    PermissionContext, PermissionMatrix, RelationshipStatus, UserRoleAssignment,
};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::{
    ApprovalPolicy, ApprovalRequestQuery, ApprovalRequestRepository, ApprovalService, AuditEntry,
    AuditFailurePolicy, AuditLogQuery, AuditLogRepository, AuditLogger, AuditRepository, Clock,
    Notification, NotificationPublisher, PermissionChecker, PermissionContextCache,
    RelationshipRepository, RelationshipService, RoleAssignmentRepository, RoleAssignmentService,
    ScopeResolver,
};

pub(crate) struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub(crate) fn at(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[derive(Default)]
pub(crate) struct FakeRoleAssignmentRepository {
    assignments: Mutex<Vec<UserRoleAssignment>>,
}

#[async_trait]
impl RoleAssignmentRepository for FakeRoleAssignmentRepository {
    async fn list_assignments_for_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_assignment(&self, assignment_id: Uuid) -> AppResult<Option<UserRoleAssignment>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .find(|assignment| assignment.assignment_id == assignment_id)
            .cloned())
    }

    async fn save_assignment(&self, assignment: UserRoleAssignment) -> AppResult<()> {
        self.assignments.lock().await.push(assignment);
        Ok(())
    }

    async fn deactivate_assignment(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<UserRoleAssignment>> {
        let mut assignments = self.assignments.lock().await;
        Ok(assignments
            .iter_mut()
            .find(|assignment| assignment.assignment_id == assignment_id)
            .map(|assignment| {
                assignment.is_active = false;
                assignment.clone()
            }))
    }
}

#[derive(Default)]
pub(crate) struct FakeRelationshipRepository {
    relationships: Mutex<Vec<ManagingRelationship>>,
}

impl FakeRelationshipRepository {
    pub(crate) async fn insert_raw(&self, relationship: ManagingRelationship) {
        self.relationships.lock().await.push(relationship);
    }
}

#[async_trait]
impl RelationshipRepository for FakeRelationshipRepository {
    async fn list_active_relationships_for_owner(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ManagingRelationship>> {
        let mut active: Vec<ManagingRelationship> = self
            .relationships
            .lock()
            .await
            .iter()
            .filter(|relationship| relationship.owner_id == owner_id)
            .filter(|relationship| relationship.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|left, right| {
            left.started_at
                .cmp(&right.started_at)
                .then_with(|| left.managing_org_id.cmp(&right.managing_org_id))
        });
        Ok(active)
    }

    async fn find_active_relationship(
        &self,
        managing_org_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ManagingRelationship>> {
        Ok(self
            .relationships
            .lock()
            .await
            .iter()
            .find(|relationship| {
                relationship.managing_org_id == managing_org_id
                    && relationship.owner_id == owner_id
                    && relationship.is_active_at(now)
            })
            .cloned())
    }

    async fn find_relationship(
        &self,
        relationship_id: Uuid,
    ) -> AppResult<Option<ManagingRelationship>> {
        Ok(self
            .relationships
            .lock()
            .await
            .iter()
            .find(|relationship| relationship.relationship_id == relationship_id)
            .cloned())
    }

    async fn list_relationships_for_owner(
        &self,
        owner_id: &str,
    ) -> AppResult<Vec<ManagingRelationship>> {
        let mut relationships: Vec<ManagingRelationship> = self
            .relationships
            .lock()
            .await
            .iter()
            .filter(|relationship| relationship.owner_id == owner_id)
            .cloned()
            .collect();
        relationships.sort_by(|left, right| right.started_at.cmp(&left.started_at));
        Ok(relationships)
    }

    async fn start_relationship(&self, relationship: ManagingRelationship) -> AppResult<()> {
        let mut relationships = self.relationships.lock().await;
        if relationships.iter().any(|stored| {
            stored.status == RelationshipStatus::Active
                && stored.managing_org_id == relationship.managing_org_id
                && stored.owner_id == relationship.owner_id
        }) {
            return Err(AppError::Conflict(
                "managing relationship already active".to_owned(),
            ));
        }
        relationships.push(relationship);
        Ok(())
    }

    async fn mark_relationship_ended(
        &self,
        relationship: &ManagingRelationship,
    ) -> AppResult<bool> {
        let mut relationships = self.relationships.lock().await;
        let Some(stored) = relationships.iter_mut().find(|stored| {
            stored.relationship_id == relationship.relationship_id
                && stored.status == RelationshipStatus::Active
        }) else {
            return Ok(false);
        };
        *stored = relationship.clone();
        Ok(true)
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) entries: Mutex<Vec<AuditEntry>>,
    pub(crate) append_delay_ms: AtomicU64,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
        let delay_ms = self.append_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
        let mut entries = self.entries.lock().await;
        if !entries.iter().any(|stored| stored.id == entry.id) {
            entries.push(entry);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditRepository {
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .filter(|entry| query.action.is_none_or(|action| entry.action == action))
            .filter(|entry| {
                query
                    .actor_id
                    .as_deref()
                    .is_none_or(|actor_id| entry.actor_id == actor_id)
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeApprovalRequestRepository {
    requests: Mutex<HashMap<ApprovalRequestId, ApprovalRequest>>,
    pub(crate) unavailable: AtomicBool,
    held_transitions: Mutex<Option<(ApprovalStatus, Arc<Notify>)>>,
}

impl FakeApprovalRequestRepository {
    /// Parks every transition into `status` until the returned gate is notified.
    pub(crate) async fn hold_transitions_to(&self, status: ApprovalStatus) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.held_transitions.lock().await = Some((status, gate.clone()));
        gate
    }

    pub(crate) async fn stored(&self, request_id: ApprovalRequestId) -> Option<ApprovalRequest> {
        self.requests.lock().await.get(&request_id).cloned()
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal("approval store offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalRequestRepository for FakeApprovalRequestRepository {
    async fn insert_request(&self, request: ApprovalRequest) -> AppResult<()> {
        self.ensure_available()?;
        self.requests.lock().await.insert(request.id, request);
        Ok(())
    }

    async fn find_request(
        &self,
        request_id: ApprovalRequestId,
    ) -> AppResult<Option<ApprovalRequest>> {
        self.ensure_available()?;
        Ok(self.stored(request_id).await)
    }

    async fn apply_transition(
        &self,
        transition: &ApprovalTransition,
    ) -> AppResult<Option<ApprovalRequest>> {
        self.ensure_available()?;
        let gate = self
            .held_transitions
            .lock()
            .await
            .as_ref()
            .filter(|(status, _)| *status == transition.to)
            .map(|(_, gate)| gate.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut requests = self.requests.lock().await;
        let Some(stored) = requests.get_mut(&transition.request_id) else {
            return Ok(None);
        };
        if stored.status != transition.from {
            return Ok(None);
        }
        *stored = stored.apply(transition);
        Ok(Some(stored.clone()))
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<ApprovalRequest>> {
        self.ensure_available()?;
        let mut due: Vec<ApprovalRequest> = self
            .requests
            .lock()
            .await
            .values()
            .filter(|request| request.is_due_for_expiry(now))
            .cloned()
            .collect();
        due.sort_by_key(|request| request.expires_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn list_requests(&self, query: ApprovalRequestQuery) -> AppResult<Vec<ApprovalRequest>> {
        self.ensure_available()?;
        let mut requests: Vec<ApprovalRequest> = self
            .requests
            .lock()
            .await
            .values()
            .filter(|request| {
                query
                    .owner_id
                    .as_deref()
                    .is_none_or(|owner_id| request.owner_id == owner_id)
            })
            .filter(|request| {
                query
                    .requested_by
                    .as_deref()
                    .is_none_or(|requested_by| request.requested_by == requested_by)
            })
            .filter(|request| query.status.is_none_or(|status| request.status == status))
            .cloned()
            .collect();
        requests.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(requests
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotificationPublisher {
    pub(crate) sent: Mutex<Vec<Notification>>,
    pub(crate) failing: AtomicBool,
}

#[async_trait]
impl NotificationPublisher for RecordingNotificationPublisher {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("notification outbox full".to_owned()));
        }
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct CountingContextCache {
    contexts: Mutex<HashMap<String, PermissionContext>>,
    pub(crate) hits: AtomicUsize,
    pub(crate) ttls: Mutex<Vec<u32>>,
}

#[async_trait]
impl PermissionContextCache for CountingContextCache {
    async fn get_context(&self, key: &str) -> AppResult<Option<PermissionContext>> {
        let context = self.contexts.lock().await.get(key).cloned();
        if context.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(context)
    }

    async fn set_context(
        &self,
        key: &str,
        context: &PermissionContext,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        self.ttls.lock().await.push(ttl_seconds);
        if ttl_seconds > 0 {
            self.contexts
                .lock()
                .await
                .insert(key.to_owned(), context.clone());
        }
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> AppResult<()> {
        self.contexts.lock().await.remove(key);
        Ok(())
    }
}

/// Wires every service against in-memory fakes sharing one clock.
pub(crate) struct TestHarness {
    pub(crate) clock: Arc<FixedClock>,
    pub(crate) assignments: Arc<FakeRoleAssignmentRepository>,
    pub(crate) relationships: Arc<FakeRelationshipRepository>,
    pub(crate) audit: Arc<FakeAuditRepository>,
    pub(crate) approvals: Arc<FakeApprovalRequestRepository>,
    pub(crate) notifier: Arc<RecordingNotificationPublisher>,
    pub(crate) cache: Option<Arc<CountingContextCache>>,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            clock: Arc::new(FixedClock::at(start)),
            assignments: Arc::new(FakeRoleAssignmentRepository::default()),
            relationships: Arc::new(FakeRelationshipRepository::default()),
            audit: Arc::new(FakeAuditRepository::default()),
            approvals: Arc::new(FakeApprovalRequestRepository::default()),
            notifier: Arc::new(RecordingNotificationPublisher::default()),
            cache: None,
        }
    }

    pub(crate) fn with_cache(mut self) -> Self {
        self.cache = Some(Arc::new(CountingContextCache::default()));
        self
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn audit_logger(&self) -> AuditLogger {
        AuditLogger::new(self.audit.clone(), AuditFailurePolicy::Drop)
    }

    pub(crate) fn permission_checker(&self) -> PermissionChecker {
        PermissionChecker::new(
            Arc::new(PermissionMatrix::standard()),
            self.assignments.clone(),
            self.audit_logger(),
            self.clock.clone(),
        )
    }

    pub(crate) fn scope_resolver(&self) -> ScopeResolver {
        let resolver = ScopeResolver::new(self.relationships.clone(), self.clock.clone());
        match &self.cache {
            Some(cache) => resolver.with_cache(cache.clone(), 30),
            None => resolver,
        }
    }

    pub(crate) fn approval_service(&self) -> ApprovalService {
        ApprovalService::new(
            self.permission_checker(),
            self.scope_resolver(),
            self.approvals.clone(),
            self.audit_logger(),
            self.notifier.clone(),
            self.clock.clone(),
            ApprovalPolicy::default(),
        )
    }

    pub(crate) fn relationship_service(&self) -> RelationshipService {
        RelationshipService::new(
            self.permission_checker(),
            self.scope_resolver(),
            self.relationships.clone(),
            self.audit_logger(),
            self.clock.clone(),
        )
    }

    pub(crate) fn role_assignment_service(&self) -> RoleAssignmentService {
        RoleAssignmentService::new(
            self.permission_checker(),
            self.assignments.clone(),
            self.audit_logger(),
            self.clock.clone(),
        )
    }

    pub(crate) async fn seed_assignment(&self, assignment: UserRoleAssignment) {
        self.assignments.assignments.lock().await.push(assignment);
    }

    pub(crate) async fn seed_relationship(
        &self,
        managing_org_id: &str,
        owner_id: &str,
    ) -> ManagingRelationship {
        let relationship =
            ManagingRelationship::start(managing_org_id, owner_id, self.now() - Duration::days(30))
                .unwrap_or_else(|error| panic!("relationship should be valid: {error}"));
        self.relationships.insert_raw(relationship.clone()).await;
        relationship
    }

    pub(crate) async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries.lock().await.clone()
    }

    pub(crate) async fn notifications(&self) -> Vec<Notification> {
        self.notifier.sent.lock().await.clone()
    }
}
