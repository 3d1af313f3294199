//! Change filter: decides when a detection is worth archiving

use moodcam_core::{DetectionConfig, RawDetection};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.60;
pub const DEFAULT_CONFIDENCE_DELTA: f64 = 0.01;

/// Result of evaluating one detector invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No box reached the confidence threshold
    NoCandidate,
    /// Same label as last time and the confidence barely moved
    Duplicate(RawDetection),
    /// Worth archiving and publishing
    Novel(RawDetection),
}

/// Remembers the last accepted (label, confidence) pair.
///
/// A candidate is novel iff its confidence reaches the threshold and either
/// the label changed or the confidence moved by at least `min_delta`.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    threshold: f64,
    min_delta: f64,
    previous: Option<(String, f64)>,
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CONFIDENCE_DELTA)
    }
}

impl ChangeFilter {
    pub fn new(threshold: f64, min_delta: f64) -> Self {
        Self {
            threshold,
            min_delta,
            previous: None,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.confidence_threshold, config.confidence_delta)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// First box at or above the threshold, in model order.
    pub fn candidate<'a>(&self, detections: &'a [RawDetection]) -> Option<&'a RawDetection> {
        detections.iter().find(|d| d.confidence >= self.threshold)
    }

    pub fn is_novel(&self, detection: &RawDetection) -> bool {
        if detection.confidence < self.threshold {
            return false;
        }
        match &self.previous {
            None => true,
            Some((label, confidence)) => {
                detection.label != *label
                    || (detection.confidence - confidence).abs() >= self.min_delta
            }
        }
    }

    /// Classify one detector result without changing any state.
    pub fn evaluate(&self, detections: &[RawDetection]) -> Verdict {
        match self.candidate(detections) {
            None => Verdict::NoCandidate,
            Some(d) if self.is_novel(d) => Verdict::Novel(d.clone()),
            Some(d) => Verdict::Duplicate(d.clone()),
        }
    }

    /// Record `detection` as the new reference point.
    pub fn accept(&mut self, detection: &RawDetection) {
        self.previous = Some((detection.label.clone(), detection.confidence));
    }

    pub fn previous(&self) -> Option<(&str, f64)> {
        self.previous.as_ref().map(|(l, c)| (l.as_str(), *c))
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
