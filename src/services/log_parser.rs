//! Day log parser
//!
//! Turns newline-delimited `LogEntry` JSON into one `Conversation` per phone
//! number. Bad lines are counted and skipped; a line without its trailing
//! `\n` is still being written and is left for the next run.

use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{Conversation, DedupKey, LogEntry};
use crate::utils::SyncError;

#[derive(Debug, Default, Clone)]
pub struct ParseReport {
    pub conversations: BTreeMap<String, Conversation>,
    pub stats: ParseStats,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub valid_lines: usize,
    pub malformed_lines: usize,
    pub duplicate_lines: usize,
    /// Set when the file ended mid-line
    pub pending_tail: bool,
}

impl ParseStats {
    pub fn absorb(&mut self, other: ParseStats) {
        self.valid_lines += other.valid_lines;
        self.malformed_lines += other.malformed_lines;
        self.duplicate_lines += other.duplicate_lines;
        self.pending_tail |= other.pending_tail;
    }
}

impl ParseReport {
    pub fn entry_count(&self) -> usize {
        self.conversations.values().map(Conversation::len).sum()
    }
}

fn parse_line(bytes: &[u8]) -> Option<LogEntry> {
    let text = std::str::from_utf8(bytes).ok()?;
    let entry: LogEntry = serde_json::from_str(text).ok()?;
    if entry.phone_number.trim().is_empty() {
        return None;
    }
    Some(entry)
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Parses a whole stream; I/O errors end the read, keeping what was parsed
pub fn parse_log<R: BufRead>(mut reader: R) -> ParseReport {
    let mut report = ParseReport::default();
    let mut seen: HashSet<DedupKey> = HashSet::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("⚠️ Log read stopped at line {}: {}", line_no + 1, e);
                break;
            }
        };
        line_no += 1;

        let complete = buf.last() == Some(&b'\n');
        let line = if complete { &buf[..read - 1] } else { &buf[..] };

        if is_blank(line) {
            continue;
        }
        if !complete {
            debug!("Line {} has no terminator yet, deferring", line_no);
            report.stats.pending_tail = true;
            break;
        }

        let Some(entry) = parse_line(line) else {
            debug!("Skipping malformed log line {}", line_no);
            report.stats.malformed_lines += 1;
            continue;
        };

        if !seen.insert(entry.dedup_key()) {
            report.stats.duplicate_lines += 1;
            continue;
        }

        report.stats.valid_lines += 1;
        report
            .conversations
            .entry(entry.phone_number.clone())
            .or_insert_with(|| Conversation::new(entry.phone_number.clone()))
            .push(entry);
    }

    for conversation in report.conversations.values_mut() {
        conversation.sort();
    }

    report
}

pub fn parse_bytes(bytes: &[u8]) -> ParseReport {
    parse_log(bytes)
}

/// Reads one day file; a file that does not exist yet is an empty day
pub async fn parse_file(path: impl AsRef<Path>) -> Result<ParseReport, SyncError> {
    let path = path.as_ref();
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(parse_bytes(&bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ParseReport::default()),
        Err(e) => Err(SyncError::Io(e)),
    }
}
