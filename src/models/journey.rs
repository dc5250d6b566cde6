use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use super::log_entry::LogEntry;

/// All log entries of one phone number, oldest first
///
/// Sorting is stable, so entries with equal timestamps keep file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub phone_number: String,
    pub entries: Vec<LogEntry>,
}

impl Conversation {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            entries: Vec::new(),
        }
    }

    pub fn from_entries(phone_number: impl Into<String>, mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(|e| e.timestamp);
        Self {
            phone_number: phone_number.into(),
            entries,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Restores timestamp order after pushes
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.timestamp);
    }

    /// Appends another day's entries for the same phone, dropping copies
    /// already present
    pub fn merge(&mut self, other: Conversation) {
        let mut seen: HashSet<_> = self.entries.iter().map(LogEntry::dedup_key).collect();
        for entry in other.entries {
            if seen.insert(entry.dedup_key()) {
                self.entries.push(entry);
            }
        }
        self.sort();
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|e| e.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn span(&self) -> Option<ConversationSpan> {
        Some(ConversationSpan {
            first_timestamp: self.first_timestamp()?,
            last_timestamp: self.last_timestamp()?,
            message_count: self.entries.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversationSpan {
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub message_count: usize,
}

/// What the extractor learned from one conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyRecord {
    pub phone_number: String,
    pub derived_fields: BTreeMap<String, Value>,
    pub span: ConversationSpan,
}
