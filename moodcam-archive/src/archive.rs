use crate::error::Result;
use async_trait::async_trait;
use moodcam_core::{ArchivedRecord, LogEntry};
use std::path::Path;

/// Hard cap on records returned by a log query.
pub const MAX_LOG_RECORDS: usize = 100;

/// Remote persistence for detection events.
///
/// Nothing here retries; a failed call is reported once and the caller
/// decides what the failure means for the current tick or request.
#[async_trait]
pub trait Archive: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upload a local JPEG under a fresh unique key and return its public URL.
    async fn upload_image(&self, local_path: &Path) -> Result<String>;

    /// Append one record to the log table.
    async fn insert_record(&self, record: &ArchivedRecord) -> Result<()>;

    /// Most recent rows, newest first, at most `limit` of them. Rows come
    /// back as stored, including columns the store manages itself.
    async fn recent_records(&self, limit: usize) -> Result<Vec<LogEntry>>;
}

/// Object name for a new blob.
pub fn blob_name() -> String {
    format!("{}.jpg", uuid::Uuid::new_v4())
}

/// Clamp a requested page size to `1..=MAX_LOG_RECORDS`, with 0 meaning the maximum.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => MAX_LOG_RECORDS,
        Some(n) => n.min(MAX_LOG_RECORDS),
    }
}

/// Order by timestamp descending and keep at most `limit` rows.
pub fn newest_first(mut records: Vec<LogEntry>, limit: usize) -> Vec<LogEntry> {
    // timestamps are "%Y-%m-%d %H:%M:%S", so lexical order is chronological;
    // rows without one sort last
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.truncate(limit);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: &str) -> LogEntry {
        LogEntry::from(ArchivedRecord {
            emotion: "neutral".to_string(),
            confidence: 0.7,
            timestamp: ts.to_string(),
            image_url: String::new(),
        })
    }

    #[test]
    fn test_blob_names_are_unique_jpegs() {
        let a = blob_name();
        let b = blob_name();
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert_eq!(a.len(), 36 + 4);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(0)), 100);
        assert_eq!(clamp_limit(Some(5)), 5);
        assert_eq!(clamp_limit(Some(10_000)), 100);
    }

    #[test]
    fn test_newest_first() {
        let records = vec![
            record("2024-01-01 10:00:00"),
            record("2024-01-02 09:00:00"),
            record("2023-12-31 23:59:59"),
        ];
        let sorted = newest_first(records, 2);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].timestamp.as_deref(), Some("2024-01-02 09:00:00"));
        assert_eq!(sorted[1].timestamp.as_deref(), Some("2024-01-01 10:00:00"));
    }

    #[test]
    fn test_rows_without_timestamp_sort_last() {
        let mut undated = record("2024-01-01 10:00:00");
        undated.timestamp = None;
        let sorted = newest_first(vec![undated, record("2023-01-01 00:00:00")], 10);
        assert_eq!(sorted[0].timestamp.as_deref(), Some("2023-01-01 00:00:00"));
        assert!(sorted[1].timestamp.is_none());
    }
}
