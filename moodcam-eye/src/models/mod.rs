//! Detector models

pub mod yolo;

#[cfg(feature = "onnx")]
pub use yolo::YoloDetector;
pub use yolo::{decode_predictions, non_max_suppression, DecodeParams, OutputLayout};
