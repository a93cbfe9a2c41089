use chrono::Duration;

/// Approval engine policy values supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPolicy {
    /// Time between creation and expiry of a request.
    pub request_ttl: Duration,
    /// Largest id list accepted by one bulk decision.
    pub max_bulk_size: usize,
    /// Rows transitioned per expiry sweep page.
    pub expiry_batch_size: usize,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            request_ttl: Duration::days(7),
            max_bulk_size: 500,
            expiry_batch_size: 200,
        }
    }
}

/// What the audit logger does with an entry the store rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFailurePolicy {
    /// Log and discard the entry.
    Drop,
    /// Hold up to `capacity` entries for a later retry, discarding the oldest.
    Buffer {
        /// Maximum number of held entries.
        capacity: usize,
    },
}

impl Default for AuditFailurePolicy {
    fn default() -> Self {
        Self::Buffer { capacity: 1024 }
    }
}
