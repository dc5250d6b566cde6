//! Seams between the dispatcher and the external APIs
//!
//! The dispatcher talks to these traits only; production wires in the Zoho
//! and Google clients, tests use in-memory fakes.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::utils::SyncError;
use google_sheets::SheetsClient;
use zoho_crm::{LeadRef, ZohoClient};

#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn find_leads(&self, token: &str, mobile: &str, lead_source: &str) -> Result<Vec<LeadRef>, SyncError>;

    async fn update_lead(&self, token: &str, lead_id: &str, fields: &Map<String, Value>) -> Result<(), SyncError>;
}

#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// 1-based row whose key column equals `key`
    async fn find_row(&self, token: &str, key: &str) -> Result<Option<usize>, SyncError>;

    async fn append_row(&self, token: &str, row: &[Value]) -> Result<(), SyncError>;

    async fn update_row(&self, token: &str, row_number: usize, row: &[Value]) -> Result<(), SyncError>;

    /// Writes the header into row 1 when the sheet is empty
    async fn ensure_header(&self, token: &str, header: &[Value]) -> Result<(), SyncError>;
}

pub struct ZohoCrmGateway {
    client: ZohoClient,
}

impl ZohoCrmGateway {
    pub fn new(client: ZohoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CrmGateway for ZohoCrmGateway {
    async fn find_leads(&self, token: &str, mobile: &str, lead_source: &str) -> Result<Vec<LeadRef>, SyncError> {
        Ok(self.client.search_leads(token, mobile, lead_source).await?)
    }

    async fn update_lead(&self, token: &str, lead_id: &str, fields: &Map<String, Value>) -> Result<(), SyncError> {
        Ok(self.client.update_lead(token, lead_id, fields).await?)
    }
}

pub struct GoogleSheetGateway {
    client: SheetsClient,
    sheet_name: String,
}

impl GoogleSheetGateway {
    pub fn new(client: SheetsClient, sheet_name: impl Into<String>) -> Self {
        Self {
            client,
            sheet_name: sheet_name.into(),
        }
    }
}

#[async_trait]
impl SheetGateway for GoogleSheetGateway {
    async fn find_row(&self, token: &str, key: &str) -> Result<Option<usize>, SyncError> {
        Ok(self.client.find_row_by_key(token, &self.sheet_name, key).await?)
    }

    async fn append_row(&self, token: &str, row: &[Value]) -> Result<(), SyncError> {
        Ok(self.client.append_row(token, &self.sheet_name, row).await?)
    }

    async fn update_row(&self, token: &str, row_number: usize, row: &[Value]) -> Result<(), SyncError> {
        Ok(self.client.update_row(token, &self.sheet_name, row_number, row).await?)
    }

    async fn ensure_header(&self, token: &str, header: &[Value]) -> Result<(), SyncError> {
        let current = self.client.get_row(token, &self.sheet_name, 1).await?;
        if current.is_empty() {
            tracing::info!("📄 Writing header row to sheet '{}'", self.sheet_name);
            self.client.update_row(token, &self.sheet_name, 1, header).await?;
        } else if current.iter().map(google_sheets::cell_text).ne(header.iter().map(google_sheets::cell_text)) {
            tracing::warn!(
                "⚠️ Sheet '{}' header differs from the field mapping; rows follow the mapping order",
                self.sheet_name
            );
        }
        Ok(())
    }
}
