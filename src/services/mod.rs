pub mod dispatcher;
pub mod gateways;
pub mod journey_extractor;
pub mod log_parser;
pub mod log_writer;
pub mod menu_flow;
pub mod pipeline;
pub mod scheduler;
pub mod sync_ledger;

pub use dispatcher::{CrmOutcome, CrmTarget, DispatchReport, SheetOutcome, SheetTarget, SyncDispatcher};
pub use gateways::{CrmGateway, GoogleSheetGateway, SheetGateway, ZohoCrmGateway};
pub use journey_extractor::{Extraction, ExtractionRule, JourneyExtractor, KeywordRule};
pub use log_parser::{parse_bytes, parse_file, parse_log, ParseReport, ParseStats};
pub use log_writer::LogWriter;
pub use pipeline::{PipelineConfig, RunReport, SyncJob, SyncPipeline};
pub use scheduler::{LastRun, SyncScheduler, TriggerOutcome};
pub use sync_ledger::{fingerprint, LedgerEntry, SyncLedger};
