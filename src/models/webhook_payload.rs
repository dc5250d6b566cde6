use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::log_entry::{Direction, LogEntry};
use crate::utils::normalization::normalize_phone;

/// WATI webhook body (message received / session message sent)
///
/// Only the fields the log needs are typed; the whole body is kept verbatim
/// in `LogEntry::raw_payload`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct WatiWebhookPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    /// Unix seconds, as a string or a number depending on the event
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// `true` when the message was sent by the business number
    #[serde(default)]
    pub owner: Option<bool>,
    #[serde(default)]
    pub button_reply: Option<ReplyPayload>,
    #[serde(default)]
    pub interactive_button_reply: Option<ReplyPayload>,
    #[serde(default)]
    pub list_reply: Option<ReplyPayload>,
}

/// Button / list selections; WATI uses `text` for template buttons and
/// `title` for interactive ones
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReplyPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ReplyPayload {
    fn label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.title.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

const OUTBOUND_EVENTS: &[&str] = &["sessionMessageSent", "templateMessageSent", "broadcastMessageSent"];

impl WatiWebhookPayload {
    pub fn phone_number(&self) -> Option<String> {
        self.wa_id
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty())
    }

    pub fn direction(&self) -> Direction {
        let outbound_event = self
            .event_type
            .as_deref()
            .map_or(false, |e| OUTBOUND_EVENTS.contains(&e));

        if self.owner == Some(true) || outbound_event {
            Direction::Outbound
        } else {
            Direction::Inbound
        }
    }

    /// Free text, or the label of the button / list option that was tapped
    pub fn message_text(&self) -> String {
        let text = self.text.as_deref().map(str::trim).filter(|s| !s.is_empty());

        text.or_else(|| self.button_reply.as_ref().and_then(ReplyPayload::label))
            .or_else(|| self.interactive_button_reply.as_ref().and_then(ReplyPayload::label))
            .or_else(|| self.list_reply.as_ref().and_then(ReplyPayload::label))
            .unwrap_or_default()
            .to_string()
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(secs) = s.parse::<i64>() {
                    Utc.timestamp_opt(secs, 0).single()
                } else {
                    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
                }
            }
            _ => None,
        }
    }

    /// Builds the log line; `received_at` stands in when WATI sent no usable timestamp
    pub fn into_log_entry(self, raw_payload: Value, received_at: DateTime<Utc>) -> Result<LogEntry, String> {
        let phone_number = self
            .phone_number()
            .ok_or_else(|| "missing or empty waId".to_string())?;

        Ok(LogEntry {
            timestamp: self.sent_at().unwrap_or(received_at),
            direction: self.direction(),
            message_text: self.message_text(),
            phone_number,
            raw_payload,
        })
    }
}
