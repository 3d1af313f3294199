use chrono::{DateTime, Local};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Format used for every timestamp the system produces.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const PLACEHOLDER_EMOTION: &str = "None";
pub const PLACEHOLDER_TIME: &str = "00:00:00";

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; 0.0 for degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }

        let inter = (ix2 - ix1) * (iy2 - iy1);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }
        inter / union
    }
}

/// One labeled box as returned by a detector, before any filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_id: 0,
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// A confident classification of a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub timestamp: String,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, at: DateTime<Local>) -> Self {
        Self {
            label: label.into(),
            confidence,
            timestamp: format_timestamp(&at),
        }
    }
}

/// Row of the remote `emotion_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    pub emotion: String,
    pub confidence: f64,
    pub timestamp: String,
    pub image_url: String,
}

impl ArchivedRecord {
    pub fn new(detection: &Detection, image_url: impl Into<String>) -> Self {
        Self {
            emotion: detection.label.clone(),
            confidence: round_confidence(detection.confidence),
            timestamp: detection.timestamp.clone(),
            image_url: image_url.into(),
        }
    }
}

/// One row as returned by the log query.
///
/// Known columns are nullable and any other column the table carries
/// (`id`, `created_at`, ...) is kept in `extra`, so rows pass through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<ArchivedRecord> for LogEntry {
    fn from(record: ArchivedRecord) -> Self {
        Self {
            emotion: Some(record.emotion),
            confidence: Some(record.confidence),
            timestamp: Some(record.timestamp),
            image_url: Some(record.image_url),
            extra: serde_json::Map::new(),
        }
    }
}

/// The most recent published detection.
///
/// Before anything is published this holds placeholder values and serializes
/// its timestamp under `time`; afterwards the key is `timestamp`, matching the
/// archived rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestState {
    pub emotion: String,
    pub confidence: f64,
    pub timestamp: String,
    pub image_url: String,
    observed: bool,
}

impl LatestState {
    pub fn placeholder() -> Self {
        Self {
            emotion: PLACEHOLDER_EMOTION.to_string(),
            confidence: 0.0,
            timestamp: PLACEHOLDER_TIME.to_string(),
            image_url: String::new(),
            observed: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        !self.observed
    }
}

impl Default for LatestState {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl From<&ArchivedRecord> for LatestState {
    fn from(record: &ArchivedRecord) -> Self {
        Self {
            emotion: record.emotion.clone(),
            confidence: record.confidence,
            timestamp: record.timestamp.clone(),
            image_url: record.image_url.clone(),
            observed: true,
        }
    }
}

impl Serialize for LatestState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LatestState", 4)?;
        state.serialize_field("emotion", &self.emotion)?;
        state.serialize_field("confidence", &self.confidence)?;
        if self.observed {
            state.serialize_field("timestamp", &self.timestamp)?;
        } else {
            state.serialize_field("time", &self.timestamp)?;
        }
        state.serialize_field("image_url", &self.image_url)?;
        state.end()
    }
}

/// Two-decimal rounding applied to published and archived confidences.
pub fn round_confidence(confidence: f64) -> f64 {
    (confidence * 100.0).round() / 100.0
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
