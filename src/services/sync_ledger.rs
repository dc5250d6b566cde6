//! Per-phone record of what was last pushed
//!
//! Journey records are recomputed from the logs on every run. The ledger
//! keeps a fingerprint of the last payload each target accepted, so an
//! unchanged record is not sent again, including after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::utils::logging::*;
use crate::utils::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub crm_fingerprint: Option<String>,
    #[serde(default)]
    pub sheet_fingerprint: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SyncLedger {
    path: Option<PathBuf>,
    entries: BTreeMap<String, LedgerEntry>,
    dirty: bool,
}

/// SHA-256 hex of the value's JSON form; map keys are ordered, so equal
/// content gives equal fingerprints
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

impl SyncLedger {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the ledger; an unreadable file starts a fresh ledger so the
    /// next run re-sends everything instead of stopping
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    log_warning(&format!(
                        "⚠️ Sync ledger {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    ));
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log_warning(&format!(
                    "⚠️ Cannot read sync ledger {} ({}), starting empty",
                    path.display(),
                    e
                ));
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            entries,
            dirty: false,
        }
    }

    /// Writes through a temp file so a crash never leaves half a ledger
    pub async fn save(&mut self) -> Result<(), SyncError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?).await?;
        tokio::fs::rename(&tmp, path).await?;

        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, phone: &str) -> Option<&LedgerEntry> {
        self.entries.get(phone)
    }

    pub fn crm_unchanged(&self, phone: &str, fingerprint: &str) -> bool {
        self.entries
            .get(phone)
            .and_then(|e| e.crm_fingerprint.as_deref())
            == Some(fingerprint)
    }

    pub fn sheet_unchanged(&self, phone: &str, fingerprint: &str) -> bool {
        self.entries
            .get(phone)
            .and_then(|e| e.sheet_fingerprint.as_deref())
            == Some(fingerprint)
    }

    pub fn record_crm(&mut self, phone: &str, fingerprint: String) {
        let entry = self.entry(phone);
        entry.crm_fingerprint = Some(fingerprint);
        entry.updated_at = Utc::now();
        self.dirty = true;
    }

    pub fn record_sheet(&mut self, phone: &str, fingerprint: String) {
        let entry = self.entry(phone);
        entry.sheet_fingerprint = Some(fingerprint);
        entry.updated_at = Utc::now();
        self.dirty = true;
    }

    fn entry(&mut self, phone: &str) -> &mut LedgerEntry {
        self.entries.entry(phone.to_string()).or_insert_with(|| LedgerEntry {
            crm_fingerprint: None,
            sheet_fingerprint: None,
            updated_at: Utc::now(),
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = json!({"b": 1, "a": "x"});
        let b = json!({"a": "x", "b": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&json!({"a": "y", "b": 1})));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_unchanged_checks() {
        let mut ledger = SyncLedger::in_memory();
        assert!(!ledger.crm_unchanged("+1", "abc"));

        ledger.record_crm("+1", "abc".to_string());
        assert!(ledger.crm_unchanged("+1", "abc"));
        assert!(!ledger.crm_unchanged("+1", "def"));
        assert!(!ledger.sheet_unchanged("+1", "abc"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("ledger.json");

        let mut ledger = SyncLedger::load(&path).await;
        assert!(ledger.is_empty());
        ledger.record_crm("+15550001", "f1".to_string());
        ledger.record_sheet("+15550001", "s1".to_string());
        ledger.save().await.unwrap();

        let reloaded = SyncLedger::load(&path).await;
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.crm_unchanged("+15550001", "f1"));
        assert!(reloaded.sheet_unchanged("+15550001", "s1"));
        assert!(!path.with_file_name("ledger.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{not json").unwrap();

        let ledger = SyncLedger::load(&path).await;
        assert!(ledger.is_empty());
    }
}
