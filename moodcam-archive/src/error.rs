//! Error types for moodcam-archive

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Upload or insert rejected or unreachable
    #[error("Storage error: {0}")]
    Storage(String),

    /// Log read failed
    #[error("Query error: {0}")]
    Query(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
