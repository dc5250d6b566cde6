//! One sync run: day logs → conversations → journey records → CRM / sheet

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::dispatcher::{CrmOutcome, DispatchReport, SheetOutcome, SyncDispatcher};
use super::journey_extractor::{Extraction, JourneyExtractor};
use super::log_parser::{parse_file, ParseStats};
use super::log_writer::log_file_path;
use super::sync_ledger::SyncLedger;
use crate::models::Conversation;
use crate::utils::logging::*;
use crate::utils::SyncError;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub log_dir: PathBuf,
    /// Prior days read besides today
    pub lookback_days: u32,
    /// Conversations active more recently than this are left for a later run
    pub quiet_period: chrono::Duration,
    /// `None` keeps the ledger in memory only
    pub ledger_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files: Vec<String>,
    pub lines: ParseStats,
    pub conversations: usize,
    pub deferred: usize,
    pub no_signal: usize,
    pub records: usize,
    pub crm_updated: usize,
    pub crm_unchanged: usize,
    pub crm_no_match: usize,
    pub crm_ambiguous: usize,
    pub crm_skipped: usize,
    pub crm_failed: usize,
    pub sheet_appended: usize,
    pub sheet_updated: usize,
    pub sheet_unchanged: usize,
    pub sheet_failed: usize,
}

impl RunReport {
    fn tally(&mut self, report: &DispatchReport) {
        match report.crm {
            CrmOutcome::Updated { .. } => self.crm_updated += 1,
            CrmOutcome::Unchanged => self.crm_unchanged += 1,
            CrmOutcome::NoMatchingLead => self.crm_no_match += 1,
            CrmOutcome::AmbiguousLead { .. } => self.crm_ambiguous += 1,
            CrmOutcome::Skipped => self.crm_skipped += 1,
            CrmOutcome::Failed(_) => self.crm_failed += 1,
        }
        match report.sheet {
            SheetOutcome::Appended => self.sheet_appended += 1,
            SheetOutcome::Updated { .. } => self.sheet_updated += 1,
            SheetOutcome::Unchanged => self.sheet_unchanged += 1,
            SheetOutcome::Disabled => {}
            SheetOutcome::Failed(_) => self.sheet_failed += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} conversations ({} deferred, {} no signal), {} records | CRM: {} updated, {} unchanged, {} no lead, {} ambiguous, {} failed | Sheet: {} appended, {} updated, {} unchanged, {} failed | lines: {} valid, {} malformed, {} duplicate",
            self.conversations,
            self.deferred,
            self.no_signal,
            self.records,
            self.crm_updated,
            self.crm_unchanged,
            self.crm_no_match,
            self.crm_ambiguous,
            self.crm_failed,
            self.sheet_appended,
            self.sheet_updated,
            self.sheet_unchanged,
            self.sheet_failed,
            self.lines.valid_lines,
            self.lines.malformed_lines,
            self.lines.duplicate_lines,
        )
    }
}

/// Anything the scheduler can run
#[async_trait]
pub trait SyncJob: Send + Sync {
    async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, SyncError>;
}

pub struct SyncPipeline {
    config: PipelineConfig,
    extractor: Arc<JourneyExtractor>,
    dispatcher: Arc<SyncDispatcher>,
}

impl SyncPipeline {
    pub fn new(config: PipelineConfig, extractor: Arc<JourneyExtractor>, dispatcher: Arc<SyncDispatcher>) -> Self {
        Self {
            config,
            extractor,
            dispatcher,
        }
    }

    /// Oldest first, so later days extend earlier ones
    fn dates(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let today = now.date_naive();
        (0..=self.config.lookback_days)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
            .collect()
    }

    async fn read_conversations(
        &self,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> Result<BTreeMap<String, Conversation>, SyncError> {
        let mut conversations: BTreeMap<String, Conversation> = BTreeMap::new();

        for date in self.dates(now) {
            let path = log_file_path(&self.config.log_dir, date);
            let parsed = parse_file(&path).await.map_err(|e| {
                log_error(&format!("❌ Cannot read log file {}: {}", path.display(), e));
                e
            })?;

            if parsed.stats.malformed_lines > 0 {
                log_warning(&format!(
                    "⚠️ {} malformed line(s) skipped in {}",
                    parsed.stats.malformed_lines,
                    path.display()
                ));
            }

            report.files.push(path.display().to_string());
            report.lines.absorb(parsed.stats);

            for (phone, conversation) in parsed.conversations {
                match conversations.get_mut(&phone) {
                    Some(existing) => existing.merge(conversation),
                    None => {
                        conversations.insert(phone, conversation);
                    }
                }
            }
        }

        Ok(conversations)
    }

    async fn load_ledger(&self) -> SyncLedger {
        match &self.config.ledger_path {
            Some(path) => SyncLedger::load(path.clone()).await,
            None => SyncLedger::in_memory(),
        }
    }
}

#[async_trait]
impl SyncJob for SyncPipeline {
    async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, SyncError> {
        let mut report = RunReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let conversations = self.read_conversations(now, &mut report).await?;
        report.conversations = conversations.len();

        let cutoff = now - self.config.quiet_period;
        let mut records = Vec::new();
        for conversation in conversations.values() {
            if conversation.last_timestamp().map_or(false, |last| last > cutoff) {
                report.deferred += 1;
                continue;
            }
            match self.extractor.extract(conversation) {
                Extraction::Record(record) => records.push(record),
                Extraction::NoSignal => report.no_signal += 1,
            }
        }
        report.records = records.len();

        if !records.is_empty() {
            if self.dispatcher.sheet_enabled() {
                if let Err(e) = self.dispatcher.prepare_sheet().await {
                    log_warning(&format!("⚠️ Could not prepare journey sheet header: {}", e));
                }
            }

            let mut ledger = self.load_ledger().await;
            for record in &records {
                let outcome = self.dispatcher.dispatch(record, &mut ledger).await;
                report.tally(&outcome);
            }

            if let Err(e) = ledger.save().await {
                log_warning(&format!("⚠️ Sync ledger not saved, next run re-sends: {}", e));
            }
        }

        report.finished_at = Some(Utc::now());
        log_run_summary(&report.summary());
        Ok(report)
    }
}
