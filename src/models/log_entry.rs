use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Who sent the message, seen from the business number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Tenant → business
    Inbound,
    /// Business or bot → tenant
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a day log file. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub phone_number: String,
    pub direction: Direction,
    pub message_text: String,
    #[serde(default)]
    pub raw_payload: Value,
}

/// Identity used to drop re-logged copies of the same message
pub type DedupKey = (DateTime<Utc>, String, String);

impl LogEntry {
    pub fn dedup_key(&self) -> DedupKey {
        (self.timestamp, self.phone_number.clone(), self.message_text.clone())
    }

    /// Date of the file partition this entry belongs to
    pub fn log_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
