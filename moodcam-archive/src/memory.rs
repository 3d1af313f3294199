//! In-process archive for dry runs and tests

use crate::archive::{blob_name, newest_first, Archive};
use crate::error::{ArchiveError, Result};
use async_trait::async_trait;
use moodcam_core::{ArchivedRecord, LogEntry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps uploaded blobs and inserted records in memory.
///
/// Each operation can be switched to fail, which is how the loop and the
/// HTTP reader are exercised against a broken store.
#[derive(Default)]
pub struct MemoryArchive {
    records: RwLock<Vec<ArchivedRecord>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    upload_attempts: RwLock<Vec<PathBuf>>,
    fail_uploads: AtomicBool,
    fail_inserts: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the log table.
    pub fn with_records(records: Vec<ArchivedRecord>) -> Self {
        let archive = Self::new();
        *archive.records.write() = records;
        archive
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Records in insertion order.
    pub fn records(&self) -> Vec<ArchivedRecord> {
        self.records.read().clone()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        let name = url.rsplit('/').next()?;
        self.blobs.read().get(name).cloned()
    }

    /// Every local path handed to `upload_image`, including failed attempts.
    pub fn upload_attempts(&self) -> Vec<PathBuf> {
        self.upload_attempts.read().clone()
    }
}

#[async_trait]
impl Archive for MemoryArchive {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload_image(&self, local_path: &Path) -> Result<String> {
        self.upload_attempts.write().push(local_path.to_path_buf());
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ArchiveError::Storage("upload refused by memory archive".to_string()));
        }

        let bytes = tokio::fs::read(local_path).await?;
        let name = blob_name();
        self.blobs.write().insert(name.clone(), bytes);
        Ok(format!("memory://emotions/{}", name))
    }

    async fn insert_record(&self, record: &ArchivedRecord) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ArchiveError::Storage("insert refused by memory archive".to_string()));
        }
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn recent_records(&self, limit: usize) -> Result<Vec<LogEntry>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ArchiveError::Query("log store unavailable".to_string()));
        }
        let rows = self.records().into_iter().map(LogEntry::from).collect();
        Ok(newest_first(rows, limit))
    }
}
