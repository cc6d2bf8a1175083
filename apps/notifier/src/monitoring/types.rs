use chrono::{DateTime, Utc};

/// Result of probing one site once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// True when the site is unreachable, timed out or answered badly
    pub exceptional: bool,

    /// Human readable detail, used verbatim in notifications
    pub message: String,

    /// When the check completed
    pub checked_at: DateTime<Utc>,

    /// HTTP status code (if a response was received)
    pub status_code: Option<u16>,

    /// Response time in milliseconds (if a response was received)
    pub latency_ms: Option<u64>,
}

impl CheckOutcome {
    /// A healthy response
    pub fn success(status_code: u16, latency_ms: u64) -> Self {
        Self {
            exceptional: false,
            message: format!("HTTP {} in {} ms", status_code, latency_ms),
            checked_at: Utc::now(),
            status_code: Some(status_code),
            latency_ms: Some(latency_ms),
        }
    }

    /// A failed check
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            exceptional: true,
            message: message.into(),
            checked_at: Utc::now(),
            status_code: None,
            latency_ms: None,
        }
    }

    /// Attach the response details of a failed check
    pub fn with_response(mut self, status_code: u16, latency_ms: u64) -> Self {
        self.status_code = Some(status_code);
        self.latency_ms = Some(latency_ms);
        self
    }
}
