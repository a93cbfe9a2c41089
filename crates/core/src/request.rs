use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Caller metadata carried into audited operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    ip_address: Option<String>,
    user_agent: Option<String>,
    #[serde(skip)]
    deadline: Option<Duration>,
}

impl RequestContext {
    /// Creates request metadata from transport values.
    #[must_use]
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
            deadline: None,
        }
    }

    /// Context for work triggered by the scheduler rather than a user.
    #[must_use]
    pub fn system() -> Self {
        Self::new(None, Some("leasehold-scheduler".to_owned()))
    }

    /// Bounds each persistence round trip made on behalf of this request.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Same caller metadata with no persistence deadline.
    #[must_use]
    pub fn without_deadline(&self) -> Self {
        Self {
            deadline: None,
            ..self.clone()
        }
    }

    /// Returns the caller IP address, when known.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the caller user agent, when known.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns the persistence deadline, when one was supplied.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}
