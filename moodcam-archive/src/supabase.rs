//! Supabase-backed archive: Storage bucket for frames, PostgREST table for records

use crate::archive::{blob_name, Archive};
use crate::error::{ArchiveError, Result};
use async_trait::async_trait;
use moodcam_core::{ArchiveConfig, ArchivedRecord, LogEntry};
use reqwest::{Client, RequestBuilder, Response};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const MAX_ERROR_BODY: usize = 512;

pub struct SupabaseArchive {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
    table: String,
}

impl SupabaseArchive {
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(ArchiveError::Config(
                "supabase_url and service_key are required".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
            table: config.table.clone(),
        })
    }

    /// Publicly resolvable URL of an object in the bucket.
    pub fn public_url(&self, object_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, object_name
        )
    }

    fn object_url(&self, object_name: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, object_name)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// Status line plus a bounded slice of the response body.
async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    format!("{}: {}", status, body)
}

#[async_trait]
impl Archive for SupabaseArchive {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn upload_image(&self, local_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(local_path).await?;
        let object_name = blob_name();
        debug!("Uploading {} bytes as {}/{}", bytes.len(), self.bucket, object_name);

        let response = self
            .authorized(self.client.post(self.object_url(&object_name)))
            .header("Content-Type", "image/jpeg")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ArchiveError::Storage(format!("upload of {} failed: {}", object_name, e)))?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            return Err(ArchiveError::Storage(format!(
                "upload of {} rejected: {}",
                object_name, detail
            )));
        }

        Ok(self.public_url(&object_name))
    }

    async fn insert_record(&self, record: &ArchivedRecord) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| ArchiveError::Storage(format!("insert into {} failed: {}", self.table, e)))?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            return Err(ArchiveError::Storage(format!(
                "insert into {} rejected: {}",
                self.table, detail
            )));
        }

        Ok(())
    }

    async fn recent_records(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let limit = limit.to_string();
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("select", "*"),
                ("order", "timestamp.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ArchiveError::Query(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ArchiveError::Query(describe_failure(response).await));
        }

        response
            .json::<Vec<LogEntry>>()
            .await
            .map_err(|e| ArchiveError::Query(format!("malformed log rows: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ArchiveConfig {
        ArchiveConfig {
            supabase_url: "https://project.supabase.co/".to_string(),
            service_key: "key".to_string(),
            ..ArchiveConfig::default()
        }
    }

    #[test]
    fn test_requires_credentials() {
        let result = SupabaseArchive::new(&ArchiveConfig::default());
        assert!(matches!(result, Err(ArchiveError::Config(_))));
    }

    #[test]
    fn test_urls() {
        let archive = SupabaseArchive::new(&config()).unwrap();
        assert_eq!(
            archive.public_url("abc.jpg"),
            "https://project.supabase.co/storage/v1/object/public/emotions/abc.jpg"
        );
        assert_eq!(
            archive.object_url("abc.jpg"),
            "https://project.supabase.co/storage/v1/object/emotions/abc.jpg"
        );
        assert_eq!(archive.table_url(), "https://project.supabase.co/rest/v1/emotion_logs");
    }
}
