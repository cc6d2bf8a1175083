use std::fmt;

use tracing::{Span, info_span};
use uuid::Uuid;

/// Identity of one invocation, used only to correlate log lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into() }
    }

    /// Context for runs started without an externally supplied id
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Span carrying the request id; every log line of the run belongs in it
    pub fn span(&self) -> Span {
        info_span!("invocation", request_id = %self.request_id)
    }
}

impl fmt::Display for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request {}", self.request_id)
    }
}
