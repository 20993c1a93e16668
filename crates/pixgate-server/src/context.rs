use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Per-request facts threaded through the gateway
///
/// `received_at` is the instant token validity is judged against, so every
/// check in one request sees the same clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Context for a request received at a fixed instant
    pub fn at(received_at: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            received_at,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
