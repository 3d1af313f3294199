//! Wiring for the real webcam + YOLO pipeline

use crate::camera::OpenCvCamera;
use crate::detection_loop::{spawn_detection_loop, DetectionHandle, DetectionLoop};
use crate::error::EyeError;
use crate::models::YoloDetector;
use crate::preview::HighGuiPreview;
use moodcam_archive::Archive;
use moodcam_core::{LatestSlot, MoodcamConfig};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

const PREVIEW_WINDOW: &str = "Emotion Detection";

/// Open the camera, load the model and start the loop on its own thread.
///
/// Camera and model failures surface here, before anything is spawned.
pub fn start_live_loop(
    config: &MoodcamConfig,
    archive: Arc<dyn Archive>,
    latest: LatestSlot,
    runtime: Handle,
) -> Result<DetectionHandle, EyeError> {
    let detector = YoloDetector::load(&config.detection)?;
    let camera = OpenCvCamera::open(&config.camera)?;

    let mut detection = DetectionLoop::new(camera, detector, archive, latest, runtime, &config.detection);
    if config.detection.preview {
        info!("Preview window enabled, press 'q' to stop");
        detection = detection.with_preview(Box::new(HighGuiPreview::new(PREVIEW_WINDOW)));
    }

    spawn_detection_loop(detection)
}
