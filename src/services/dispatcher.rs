//! Sync dispatcher
//!
//! Pushes one journey record to Zoho CRM (update of an existing lead only)
//! and mirrors it into the journey sheet. Every failure is turned into an
//! outcome for that record; nothing here aborts the batch.

use serde_json::{Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::gateways::{CrmGateway, SheetGateway};
use super::sync_ledger::{fingerprint, SyncLedger};
use crate::auth::TokenSource;
use crate::config::FieldMapping;
use crate::models::JourneyRecord;
use crate::utils::logging::*;
use crate::utils::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmOutcome {
    Updated { lead_id: String },
    /// Same payload as the last successful update
    Unchanged,
    NoMatchingLead,
    AmbiguousLead { matches: usize },
    /// No mapped CRM field present in the record
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetOutcome {
    Appended,
    Updated { row: usize },
    Unchanged,
    Disabled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub phone_number: String,
    pub crm: CrmOutcome,
    pub sheet: SheetOutcome,
}

pub struct CrmTarget {
    pub gateway: Arc<dyn CrmGateway>,
    pub tokens: Arc<dyn TokenSource>,
    pub lead_source: String,
}

pub struct SheetTarget {
    pub gateway: Arc<dyn SheetGateway>,
    pub tokens: Arc<dyn TokenSource>,
}

/// Runs `op` with the current token; on an auth rejection refreshes once and
/// retries once. A second rejection becomes an API error.
pub async fn with_token_retry<T, F, Fut>(tokens: &dyn TokenSource, mut op: F) -> Result<T, SyncError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let token = tokens.access_token().await?;
    match op(token).await {
        Err(e) if e.is_auth_expired() => {
            log_warning(&format!("🔑 {} rejected the access token, refreshing once", tokens.provider()));
            let token = tokens.refresh().await?;
            match op(token).await {
                Err(e) if e.is_auth_expired() => Err(SyncError::external(
                    tokens.provider(),
                    "access token rejected again after refresh",
                )),
                other => other,
            }
        }
        other => other,
    }
}

pub struct SyncDispatcher {
    crm: CrmTarget,
    sheet: Option<SheetTarget>,
    mapping: Arc<FieldMapping>,
    header_ready: AtomicBool,
}

impl SyncDispatcher {
    pub fn new(crm: CrmTarget, sheet: Option<SheetTarget>, mapping: Arc<FieldMapping>) -> Self {
        Self {
            crm,
            sheet,
            mapping,
            header_ready: AtomicBool::new(false),
        }
    }

    pub fn sheet_enabled(&self) -> bool {
        self.sheet.is_some()
    }

    /// Makes sure the sheet has its header row; done once per process
    pub async fn prepare_sheet(&self) -> Result<(), SyncError> {
        let Some(sheet) = &self.sheet else {
            return Ok(());
        };
        if self.header_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let header = self.mapping.sheet_header();
        let header = &header;
        let gateway = &sheet.gateway;
        with_token_retry(sheet.tokens.as_ref(), move |token| async move {
            gateway.ensure_header(&token, header).await
        })
        .await?;

        self.header_ready.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn dispatch(&self, record: &JourneyRecord, ledger: &mut SyncLedger) -> DispatchReport {
        let crm = self.sync_crm(record, ledger).await;
        let sheet = self.sync_sheet(record, ledger).await;

        DispatchReport {
            phone_number: record.phone_number.clone(),
            crm,
            sheet,
        }
    }

    async fn sync_crm(&self, record: &JourneyRecord, ledger: &mut SyncLedger) -> CrmOutcome {
        let phone = record.phone_number.as_str();
        let payload = self.mapping.crm_payload(record);
        if payload.is_empty() {
            return CrmOutcome::Skipped;
        }

        let fp = fingerprint(&payload);
        if ledger.crm_unchanged(phone, &fp) {
            return CrmOutcome::Unchanged;
        }

        let gateway = &self.crm.gateway;
        let source = self.crm.lead_source.as_str();
        let tokens = self.crm.tokens.as_ref();

        let leads = match with_token_retry(tokens, move |token| async move {
            gateway.find_leads(&token, phone, source).await
        })
        .await
        {
            Ok(leads) => leads,
            Err(e) => {
                log_crm_api_error("search_leads", phone, &e.to_string());
                return CrmOutcome::Failed(e.to_string());
            }
        };

        let lead_id = match leads.as_slice() {
            [] => {
                log_info(&format!("🔍 No matching {} lead for {}, not creating one", source, phone));
                return CrmOutcome::NoMatchingLead;
            }
            [lead] => lead.id.clone(),
            many => {
                log_warning(&format!(
                    "⚠️ {} leads match Mobile={} Lead_Source={}, skipping update",
                    many.len(),
                    phone,
                    source
                ));
                return CrmOutcome::AmbiguousLead { matches: many.len() };
            }
        };

        let payload: &Map<String, Value> = &payload;
        let id = lead_id.as_str();
        match with_token_retry(tokens, move |token| async move {
            gateway.update_lead(&token, id, payload).await
        })
        .await
        {
            Ok(()) => {
                log_crm_lead_updated(&lead_id, phone);
                ledger.record_crm(phone, fp);
                CrmOutcome::Updated { lead_id }
            }
            Err(e) => {
                log_crm_api_error("update_lead", phone, &e.to_string());
                CrmOutcome::Failed(e.to_string())
            }
        }
    }

    async fn sync_sheet(&self, record: &JourneyRecord, ledger: &mut SyncLedger) -> SheetOutcome {
        let Some(sheet) = &self.sheet else {
            return SheetOutcome::Disabled;
        };

        let phone = record.phone_number.as_str();
        let row = self.mapping.sheet_row(record);
        let fp = fingerprint(&row);
        if ledger.sheet_unchanged(phone, &fp) {
            return SheetOutcome::Unchanged;
        }

        let gateway = &sheet.gateway;
        let tokens = sheet.tokens.as_ref();
        let cells = row.as_slice();

        let existing = match with_token_retry(tokens, move |token| async move {
            gateway.find_row(&token, phone).await
        })
        .await
        {
            Ok(existing) => existing,
            Err(e) => {
                log_sheet_api_error("find_row", phone, &e.to_string());
                return SheetOutcome::Failed(e.to_string());
            }
        };

        let result = match existing {
            Some(row_number) => with_token_retry(tokens, move |token| async move {
                gateway.update_row(&token, row_number, cells).await
            })
            .await
            .map(|()| SheetOutcome::Updated { row: row_number }),
            None => with_token_retry(tokens, move |token| async move {
                gateway.append_row(&token, cells).await
            })
            .await
            .map(|()| SheetOutcome::Appended),
        };

        match result {
            Ok(outcome) => {
                ledger.record_sheet(phone, fp);
                outcome
            }
            Err(e) => {
                log_sheet_api_error("write_row", phone, &e.to_string());
                SheetOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory gateways and token source shared by dispatcher and pipeline tests

    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use zoho_crm::LeadRef;

    pub fn lead(id: &str, mobile: &str) -> LeadRef {
        LeadRef {
            id: id.to_string(),
            mobile: Some(mobile.to_string()),
            lead_source: Some("WATI".to_string()),
        }
    }

    #[derive(Default)]
    pub struct FakeCrm {
        pub leads: Mutex<Vec<LeadRef>>,
        pub find_calls: AtomicUsize,
        pub updates: Mutex<Vec<(String, Map<String, Value>)>>,
        /// Number of upcoming calls answered with an auth error
        pub reject_next: AtomicUsize,
        /// Tokens seen by each call
        pub tokens_seen: Mutex<Vec<String>>,
    }

    impl FakeCrm {
        pub fn with_leads(leads: Vec<LeadRef>) -> Self {
            Self {
                leads: Mutex::new(leads),
                ..Default::default()
            }
        }

        fn check_token(&self, token: &str) -> Result<(), SyncError> {
            self.tokens_seen.lock().unwrap().push(token.to_string());
            let pending = self.reject_next.load(Ordering::SeqCst);
            if pending > 0 {
                self.reject_next.store(pending - 1, Ordering::SeqCst);
                return Err(SyncError::AuthExpired {
                    provider: "zoho".to_string(),
                });
            }
            Ok(())
        }

        pub fn update_count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CrmGateway for FakeCrm {
        async fn find_leads(&self, token: &str, mobile: &str, lead_source: &str) -> Result<Vec<LeadRef>, SyncError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            self.check_token(token)?;
            Ok(self
                .leads
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.mobile.as_deref() == Some(mobile) && l.lead_source.as_deref() == Some(lead_source))
                .cloned()
                .collect())
        }

        async fn update_lead(&self, token: &str, lead_id: &str, fields: &Map<String, Value>) -> Result<(), SyncError> {
            self.check_token(token)?;
            self.updates
                .lock()
                .unwrap()
                .push((lead_id.to_string(), fields.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeSheet {
        pub rows: Mutex<Vec<Vec<Value>>>,
        pub writes: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl FakeSheet {
        fn check(&self) -> Result<(), SyncError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::external("google", "backend error"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SheetGateway for FakeSheet {
        async fn find_row(&self, _token: &str, key: &str) -> Result<Option<usize>, SyncError> {
            self.check()?;
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .position(|r| r.first().and_then(Value::as_str) == Some(key))
                .map(|i| i + 1))
        }

        async fn append_row(&self, _token: &str, row: &[Value]) -> Result<(), SyncError> {
            self.check()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().unwrap().push(row.to_vec());
            Ok(())
        }

        async fn update_row(&self, _token: &str, row_number: usize, row: &[Value]) -> Result<(), SyncError> {
            self.check()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().unwrap();
            if rows.len() < row_number {
                rows.resize(row_number, Vec::new());
            }
            // Null cells leave the existing value, like the values API
            let existing = &mut rows[row_number - 1];
            if existing.len() < row.len() {
                existing.resize(row.len(), Value::Null);
            }
            for (cell, value) in existing.iter_mut().zip(row) {
                if !value.is_null() {
                    *cell = value.clone();
                }
            }
            Ok(())
        }

        async fn ensure_header(&self, token: &str, header: &[Value]) -> Result<(), SyncError> {
            if self.rows.lock().unwrap().is_empty() {
                self.update_row(token, 1, header).await?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeTokens {
        pub refreshes: AtomicUsize,
        pub fail_refresh: AtomicBool,
    }

    #[async_trait]
    impl TokenSource for FakeTokens {
        fn provider(&self) -> &str {
            "fake"
        }

        async fn access_token(&self) -> Result<String, SyncError> {
            Ok(format!("token-{}", self.refreshes.load(Ordering::SeqCst)))
        }

        async fn refresh(&self) -> Result<String, SyncError> {
            if self.fail_refresh.load(Ordering::SeqCst) {
                return Err(SyncError::OAuth {
                    provider: "fake".to_string(),
                    message: "invalid_grant".to_string(),
                });
            }
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{}", n))
        }
    }
}
