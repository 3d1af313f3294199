//! Configuration for moodcam
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The binary applies command-line flags last.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Emotion classes of the bundled detector export, in class-id order.
pub const DEFAULT_LABELS: &[&str] = &[
    "angry", "disgust", "fear", "happy", "neutral", "sad", "surprise",
];

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index passed to the capture backend (0, 1, 2, ...)
    pub device_index: u32,
    /// Requested resolution (width, height)
    pub resolution: (u32, u32),
    /// Requested frame rate
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            resolution: (640, 480),
            frame_rate: 30,
        }
    }
}

/// Detector, change filter and loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// ONNX export of the emotion detector
    pub model_path: PathBuf,
    /// Class names indexed by class id
    pub labels: Vec<String>,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum score for a box to leave the detector at all
    pub candidate_threshold: f32,
    /// IoU above which overlapping boxes are suppressed
    pub iou_threshold: f32,
    /// Minimum time between two detector invocations
    pub interval_ms: u64,
    /// Minimum confidence for a detection to be considered
    pub confidence_threshold: f64,
    /// Confidence change that makes a same-label detection novel
    pub confidence_delta: f64,
    /// Where frames are written before upload
    pub scratch_dir: PathBuf,
    /// Show an annotated preview window (needs the `opencv` feature)
    pub preview: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".moodcam");
                p.push("models");
                p.push("best.onnx");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models/best.onnx"));

        Self {
            model_path,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            input_size: 640,
            candidate_threshold: 0.25,
            iou_threshold: 0.45,
            interval_ms: 1000,
            confidence_threshold: 0.60,
            confidence_delta: 0.01,
            scratch_dir: std::env::temp_dir(),
            preview: true,
        }
    }
}

impl DetectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Remote archive (Supabase) settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`
    pub supabase_url: String,
    /// Service role key
    pub service_key: String,
    /// Storage bucket receiving the JPEG frames
    pub bucket: String,
    /// Table receiving the detection records
    pub table: String,
    /// Per-request timeout; unset means wait for the store
    pub request_timeout_secs: Option<u64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            service_key: String::new(),
            bucket: "emotions".to_string(),
            table: "emotion_logs".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl ArchiveConfig {
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.service_key.is_empty()
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("supabase_url", &self.supabase_url)
            .field("service_key", &if self.service_key.is_empty() { "" } else { "***" })
            .field("bucket", &self.bucket)
            .field("table", &self.table)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// HTTP reader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Upper bound on records returned by the log endpoint
    pub log_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            log_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodcamConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub archive: ArchiveConfig,
    pub server: ServerConfig,
}

impl MoodcamConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `MOODCAM_*` / `SUPABASE_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MOODCAM_CAMERA") {
            self.camera.device_index = parse_var("MOODCAM_CAMERA", &v)?;
        }
        if let Some(v) = lookup("MOODCAM_MODEL") {
            self.detection.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MOODCAM_SCRATCH_DIR") {
            self.detection.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MOODCAM_INTERVAL_MS") {
            self.detection.interval_ms = parse_var("MOODCAM_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("MOODCAM_BIND") {
            self.server.bind_address = v;
        }
        if let Some(v) = lookup("MOODCAM_PORT") {
            self.server.port = parse_var("MOODCAM_PORT", &v)?;
        }
        if let Some(v) = lookup("SUPABASE_URL") {
            self.archive.supabase_url = v;
        }
        if let Some(v) = lookup("SUPABASE_KEY") {
            self.archive.service_key = v;
        }
        if let Some(v) = lookup("MOODCAM_BUCKET") {
            self.archive.bucket = v;
        }
        if let Some(v) = lookup("MOODCAM_TABLE") {
            self.archive.table = v;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if camera.frame_rate == 0 || camera.frame_rate > 120 {
            return Err(invalid("frame rate must be between 1 and 120"));
        }
        if camera.resolution.0 == 0 || camera.resolution.1 == 0 {
            return Err(invalid("resolution must be non-zero"));
        }
        if camera.device_index > 100 {
            return Err(invalid("camera index too large (max 100)"));
        }

        let detection = &self.detection;
        if detection.labels.is_empty() {
            return Err(invalid("at least one label is required"));
        }
        if detection.input_size == 0 || detection.input_size > 4096 {
            return Err(invalid("model input size must be between 1 and 4096"));
        }
        if !(0.0..=1.0).contains(&detection.confidence_threshold) {
            return Err(invalid("confidence threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&detection.confidence_delta) {
            return Err(invalid("confidence delta must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&detection.candidate_threshold)
            || !(0.0..=1.0).contains(&detection.iou_threshold)
        {
            return Err(invalid("detector thresholds must be within [0, 1]"));
        }

        let archive = &self.archive;
        if !archive.supabase_url.is_empty()
            && !(archive.supabase_url.starts_with("https://")
                || archive.supabase_url.starts_with("http://"))
        {
            return Err(invalid("supabase_url must be an http(s) URL"));
        }
        if archive.bucket.is_empty() || archive.table.is_empty() {
            return Err(invalid("bucket and table names must be set"));
        }

        if self.server.port == 0 {
            return Err(invalid("port must be non-zero"));
        }
        if self.server.log_limit == 0 {
            return Err(invalid("log_limit must be non-zero"));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("invalid value for {}: '{}'", key, value)))
}

fn invalid(msg: &str) -> Error {
    Error::Configuration(msg.to_string())
}
