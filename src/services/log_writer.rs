//! Append-only day log files
//!
//! Each webhook becomes one JSON line in `{dir}/{YYYY-MM-DD}.log`. The line
//! is serialized first and written with a single `write_all` on an `O_APPEND`
//! handle, so a concurrent reader sees whole lines plus at most one partial
//! tail.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::LogEntry;
use crate::utils::SyncError;

#[derive(Clone)]
pub struct LogWriter {
    dir: PathBuf,
    /// Serializes appends from concurrent webhook requests
    lock: Arc<Mutex<()>>,
}

impl LogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), SyncError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        log_file_path(&self.dir, date)
    }

    /// Writes one entry to the file of its own date and returns that path
    pub async fn append(&self, entry: &LogEntry) -> Result<PathBuf, SyncError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let path = self.path_for(entry.log_date());

        let _guard = self.lock.lock().await;
        self.ensure_dir().await?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(path)
    }

    /// Checks the directory accepts new files; used by `/ready`
    pub async fn is_writable(&self) -> bool {
        if self.ensure_dir().await.is_err() {
            return false;
        }
        let marker = self.dir.join(".write_check");
        let ok = fs::write(&marker, b"ok").await.is_ok();
        let _ = fs::remove_file(&marker).await;
        ok
    }
}

pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.log", date.format("%Y-%m-%d")))
}
