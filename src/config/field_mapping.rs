//! Derived field → CRM field / sheet column mapping
//!
//! The CRM update payload and the sheet row are built only from this
//! explicit list; a derived field that is not mapped is never sent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::models::JourneyRecord;
use crate::utils::SyncError;

const BUILTIN_MAPPING: &str = include_str!("../../config/field_mapping.yaml");

/// CRM fields used to find the lead; updates must never touch them
pub const RESERVED_CRM_FIELDS: &[&str] = &["id", "Mobile", "Lead_Source"];

/// Columns every sheet row starts with
pub const FIXED_SHEET_COLUMNS: &[&str] = &["phone_number", "journey_start", "journey_end", "message_count"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapEntry {
    pub derived: String,
    #[serde(default)]
    pub crm: Option<String>,
    #[serde(default)]
    pub sheet: Option<String>,
    /// Format the CRM field enforces; failing values stay out of the update
    #[serde(default)]
    pub format: Option<FieldFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    Email,
}

impl FieldFormat {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldFormat::Email => value.as_str().is_some_and(is_email),
        }
    }
}

/// Loose address check: one '@', no spaces, a dotted domain
fn is_email(text: &str) -> bool {
    let text = text.trim();
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "fields")]
    pub entries: Vec<FieldMapEntry>,
}

impl FieldMapping {
    pub fn builtin() -> Result<Self, SyncError> {
        Self::from_yaml(BUILTIN_MAPPING)
    }

    pub fn from_yaml(content: &str) -> Result<Self, SyncError> {
        serde_yaml::from_str(content).map_err(|e| SyncError::Config(format!("invalid field mapping: {}", e)))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                tracing::info!("📂 Loading field mapping from {}", path.display());
                Self::from_yaml(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("📂 {} not found, using built-in field mapping", path.display());
                Self::builtin()
            }
            Err(e) => Err(SyncError::Config(format!(
                "cannot read field mapping {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Checks the mapping against the fields the rule set can produce
    pub fn validate(&self, producible: &BTreeSet<String>) -> Result<(), SyncError> {
        let api_name = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$")
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let mut derived_seen = HashSet::new();
        let mut crm_seen = HashSet::new();
        let mut sheet_seen: HashSet<&str> = FIXED_SHEET_COLUMNS.iter().copied().collect();

        for entry in &self.entries {
            if !producible.contains(&entry.derived) {
                return Err(SyncError::Config(format!(
                    "field mapping: '{}' is not produced by any journey rule",
                    entry.derived
                )));
            }
            if !derived_seen.insert(entry.derived.as_str()) {
                return Err(SyncError::Config(format!(
                    "field mapping: '{}' is mapped twice",
                    entry.derived
                )));
            }
            if entry.crm.is_none() && entry.sheet.is_none() {
                return Err(SyncError::Config(format!(
                    "field mapping: '{}' has neither crm nor sheet target",
                    entry.derived
                )));
            }

            if let Some(crm) = &entry.crm {
                if !api_name.is_match(crm) {
                    return Err(SyncError::Config(format!(
                        "field mapping: '{}' is not a valid CRM API name",
                        crm
                    )));
                }
                if RESERVED_CRM_FIELDS.iter().any(|r| r.eq_ignore_ascii_case(crm)) {
                    return Err(SyncError::Config(format!(
                        "field mapping: '{}' is a lead lookup key and cannot be updated",
                        crm
                    )));
                }
                if !crm_seen.insert(crm.as_str()) {
                    return Err(SyncError::Config(format!(
                        "field mapping: CRM field '{}' is targeted twice",
                        crm
                    )));
                }
            }

            if let Some(sheet) = &entry.sheet {
                if sheet.trim().is_empty() {
                    return Err(SyncError::Config(format!(
                        "field mapping: '{}' has an empty sheet column",
                        entry.derived
                    )));
                }
                if !sheet_seen.insert(sheet.as_str()) {
                    return Err(SyncError::Config(format!(
                        "field mapping: sheet column '{}' is used twice",
                        sheet
                    )));
                }
            }
        }

        Ok(())
    }

    /// Partial update body: only mapped fields the record actually carries
    ///
    /// A value failing its entry's format is left out; the CRM would reject
    /// the whole update for it.
    pub fn crm_payload(&self, record: &JourneyRecord) -> Map<String, Value> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let crm = entry.crm.as_ref()?;
                let value = record.derived_fields.get(&entry.derived)?;
                if let Some(format) = entry.format {
                    if !format.accepts(value) {
                        tracing::warn!(
                            "⚠️ {} for {} is not a valid {:?}, not sent to CRM field {}",
                            entry.derived,
                            record.phone_number,
                            format,
                            crm
                        );
                        return None;
                    }
                }
                Some((crm.clone(), value.clone()))
            })
            .collect()
    }

    pub fn has_crm_fields(&self) -> bool {
        self.entries.iter().any(|e| e.crm.is_some())
    }

    pub fn sheet_header(&self) -> Vec<Value> {
        FIXED_SHEET_COLUMNS
            .iter()
            .map(|c| Value::String(c.to_string()))
            .chain(
                self.entries
                    .iter()
                    .filter_map(|e| e.sheet.as_ref().map(|s| Value::String(s.clone()))),
            )
            .collect()
    }

    /// Full row in header order
    ///
    /// Fields the record lacks become null cells, which the Sheets values API
    /// skips on update, so answers mirrored by an earlier run are kept.
    pub fn sheet_row(&self, record: &JourneyRecord) -> Vec<Value> {
        let mut row = vec![
            Value::String(record.phone_number.clone()),
            Value::String(record.span.first_timestamp.to_rfc3339()),
            Value::String(record.span.last_timestamp.to_rfc3339()),
            Value::from(record.span.message_count),
        ];

        for entry in self.entries.iter().filter(|e| e.sheet.is_some()) {
            let cell = match record.derived_fields.get(&entry.derived) {
                None | Some(Value::Null) => Value::Null,
                Some(v @ (Value::Array(_) | Value::Object(_))) => Value::String(v.to_string()),
                Some(v) => v.clone(),
            };
            row.push(cell);
        }

        row
    }
}
