use chrono::{DateTime, TimeZone, Utc};

/// Last known state of one site. One row per site, overwritten every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub site_name: String,
    pub exceptional: bool,
    pub last_checked: DateTime<Utc>,
    pub last_message: String,
}

impl StateRecord {
    pub fn new(
        site_name: impl Into<String>,
        exceptional: bool,
        last_checked: DateTime<Utc>,
        last_message: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            exceptional,
            last_checked,
            last_message: last_message.into(),
        }
    }

    /// Convert a timestamp to Unix seconds for storage
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp()
    }

    /// Convert stored Unix seconds back to a timestamp
    pub fn i64_to_timestamp(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).single().unwrap_or_default()
    }
}
