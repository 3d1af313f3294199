//! moodcam-core: data model, configuration and shared state for moodcam
//!
//! The detection loop and the HTTP reader only meet through the types in
//! this crate: they exchange [`LatestState`] values through a [`LatestSlot`].

pub mod config;
pub mod error;
pub mod latest;
pub mod types;

pub use config::{ArchiveConfig, CameraConfig, DetectionConfig, MoodcamConfig, ServerConfig};
pub use error::{Error, Result};
pub use latest::LatestSlot;
pub use types::{ArchivedRecord, BoundingBox, Detection, LatestState, LogEntry, RawDetection};
