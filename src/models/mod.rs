pub mod journey;
pub mod log_entry;
pub mod webhook_payload;

pub use journey::{Conversation, ConversationSpan, JourneyRecord};
pub use log_entry::{DedupKey, Direction, LogEntry};
pub use webhook_payload::{ReplyPayload, WatiWebhookPayload};
