//! moodcam-eye: capture, detection and the change-filtered detection loop
//!
//! The loop owns the camera, the detector and the change filter. It writes
//! archived frames through a [`moodcam_archive::Archive`] and publishes the
//! newest accepted detection into a [`moodcam_core::LatestSlot`].
//!
//! Camera access and the preview window need the `opencv` feature; YOLO
//! inference needs `onnx`. Without them the crate still builds and the loop
//! can be driven by any [`FrameSource`] and [`Detector`].

pub mod detection_loop;
pub mod detector;
pub mod error;
pub mod filter;
pub mod frame;
pub mod models;
pub mod preview;
pub mod scratch;

#[cfg(feature = "opencv")]
pub mod camera;
#[cfg(all(feature = "opencv", feature = "onnx"))]
pub mod live;

pub use detection_loop::{
    spawn_detection_loop, DetectionHandle, DetectionLoop, LoopStats, LoopStatus, StopReason,
    StopSignal, TickOutcome,
};
pub use detector::Detector;
pub use error::EyeError;
pub use filter::{ChangeFilter, Verdict};
pub use frame::{Frame, FrameSource};
pub use preview::{NoPreview, Preview, PreviewControl};

#[cfg(feature = "opencv")]
pub use camera::OpenCvCamera;
#[cfg(feature = "opencv")]
pub use preview::HighGuiPreview;
#[cfg(feature = "onnx")]
pub use models::YoloDetector;
