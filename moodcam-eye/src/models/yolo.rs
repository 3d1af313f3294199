//! YOLO emotion detector
//!
//! Pre- and post-processing are plain functions over `image` buffers and
//! `f32` slices so they work without ONNX Runtime. [`YoloDetector`] itself
//! needs the `onnx` feature.

use image::{imageops::FilterType, RgbImage};
use moodcam_core::{BoundingBox, RawDetection};

/// Memory layout of the raw output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, 4 + classes, proposals]` as exported by YOLOv8 / YOLO11
    AttributesFirst { attributes: usize, proposals: usize },
    /// `[1, proposals, 4 + classes]`
    ProposalsFirst { attributes: usize, proposals: usize },
}

impl OutputLayout {
    /// Work out the layout from a tensor shape and the number of classes.
    pub fn infer(shape: &[i64], num_classes: usize) -> Option<Self> {
        if shape.len() != 3 || shape[0] != 1 || shape.iter().any(|d| *d <= 0) {
            return None;
        }
        let attributes = 4 + num_classes;
        let (a, b) = (shape[1] as usize, shape[2] as usize);
        if a == attributes {
            Some(OutputLayout::AttributesFirst { attributes, proposals: b })
        } else if b == attributes {
            Some(OutputLayout::ProposalsFirst { attributes, proposals: a })
        } else {
            None
        }
    }

    fn proposals(&self) -> usize {
        match self {
            OutputLayout::AttributesFirst { proposals, .. }
            | OutputLayout::ProposalsFirst { proposals, .. } => *proposals,
        }
    }

    fn value(&self, data: &[f32], proposal: usize, attribute: usize) -> f32 {
        let idx = match *self {
            OutputLayout::AttributesFirst { proposals, .. } => attribute * proposals + proposal,
            OutputLayout::ProposalsFirst { attributes, .. } => proposal * attributes + attribute,
        };
        data.get(idx).copied().unwrap_or(0.0)
    }
}

/// Thresholds and geometry for decoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    pub input_size: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub candidate_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

/// Stretch-resize to `size`×`size` and lay out as normalised CHW floats.
pub fn to_chw_tensor(image: &RgbImage, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let raw = resized.as_raw();
    let mut tensor = vec![0f32; 3 * plane];

    for idx in 0..plane {
        tensor[idx] = raw[idx * 3] as f32 / 255.0;
        tensor[plane + idx] = raw[idx * 3 + 1] as f32 / 255.0;
        tensor[2 * plane + idx] = raw[idx * 3 + 2] as f32 / 255.0;
    }

    tensor
}

/// Turn raw predictions into labeled boxes in frame pixels, best first.
pub fn decode_predictions(
    data: &[f32],
    layout: OutputLayout,
    labels: &[String],
    params: &DecodeParams,
) -> Vec<RawDetection> {
    let scale_x = params.frame_width as f32 / params.input_size as f32;
    let scale_y = params.frame_height as f32 / params.input_size as f32;
    let frame_w = params.frame_width as f32;
    let frame_h = params.frame_height as f32;

    let mut candidates = Vec::new();
    for p in 0..layout.proposals() {
        let mut best_class = 0usize;
        let mut best_score = f32::MIN;
        for c in 0..labels.len() {
            let score = layout.value(data, p, 4 + c);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if !best_score.is_finite() || best_score < params.candidate_threshold {
            continue;
        }

        let cx = layout.value(data, p, 0);
        let cy = layout.value(data, p, 1);
        let w = layout.value(data, p, 2);
        let h = layout.value(data, p, 3);
        if ![cx, cy, w, h].iter().all(|v| v.is_finite()) || w <= 0.0 || h <= 0.0 {
            continue;
        }

        let bbox = BoundingBox::new(
            ((cx - w / 2.0) * scale_x).max(0.0),
            ((cy - h / 2.0) * scale_y).max(0.0),
            ((cx + w / 2.0) * scale_x).min(frame_w),
            ((cy + h / 2.0) * scale_y).min(frame_h),
        );
        if bbox.area() <= 0.0 {
            continue;
        }

        candidates.push(RawDetection {
            class_id: best_class,
            label: labels[best_class].clone(),
            confidence: best_score as f64,
            bbox,
        });
    }

    non_max_suppression(candidates, params.iou_threshold, params.max_detections)
}

/// Greedy NMS; the survivors come back sorted by confidence, highest first.
pub fn non_max_suppression(
    mut detections: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    detections.retain(|d| d.confidence.is_finite());
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for candidate in detections {
        if keep.len() >= max_detections {
            break;
        }
        let overlaps = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(feature = "onnx")]
pub use session::YoloDetector;

#[cfg(feature = "onnx")]
mod session {
    use super::{decode_predictions, to_chw_tensor, DecodeParams, OutputLayout};
    use crate::detector::Detector;
    use crate::error::EyeError;
    use crate::frame::Frame;
    use moodcam_core::{DetectionConfig, RawDetection};
    use ort::session::Session;
    use ort::value::Tensor;
    use tracing::{debug, info};

    const MAX_DETECTIONS: usize = 100;

    /// ONNX Runtime session over a YOLO export.
    pub struct YoloDetector {
        session: Session,
        labels: Vec<String>,
        input_size: u32,
        candidate_threshold: f32,
        iou_threshold: f32,
    }

    impl YoloDetector {
        pub fn load(config: &DetectionConfig) -> Result<Self, EyeError> {
            let path = &config.model_path;
            if !path.exists() {
                return Err(EyeError::Model(format!("Model not found at {}", path.display())));
            }

            let session = Session::builder()
                .map_err(|e| EyeError::Model(format!("Failed to create ONNX session builder: {}", e)))?
                .commit_from_file(path)
                .map_err(|e| EyeError::Model(format!("Failed to load YOLO model: {}", e)))?;

            info!("YOLO model loaded from {:?} ({} classes)", path, config.labels.len());

            Ok(Self {
                session,
                labels: config.labels.clone(),
                input_size: config.input_size,
                candidate_threshold: config.candidate_threshold,
                iou_threshold: config.iou_threshold,
            })
        }
    }

    impl Detector for YoloDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, EyeError> {
            let size = self.input_size as usize;
            let input = to_chw_tensor(frame.image(), self.input_size);
            let tensor = Tensor::from_array(([1usize, 3, size, size], input.into_boxed_slice()))
                .map_err(|e| EyeError::Model(format!("Failed to create input tensor: {}", e)))?
                .into_dyn();

            let outputs = self
                .session
                .run(ort::inputs!["images" => tensor])
                .map_err(|e| EyeError::Model(format!("YOLO inference failed: {}", e)))?;

            let (shape, data) = outputs["output0"]
                .try_extract_tensor::<f32>()
                .map_err(|e| EyeError::Model(format!("Failed to extract output tensor: {}", e)))?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            debug!("YOLO output shape: {:?}", dims);

            let layout = OutputLayout::infer(&dims, self.labels.len()).ok_or_else(|| {
                EyeError::Model(format!(
                    "Output shape {:?} does not match {} labels",
                    dims,
                    self.labels.len()
                ))
            })?;

            let params = DecodeParams {
                input_size: self.input_size,
                frame_width: frame.width(),
                frame_height: frame.height(),
                candidate_threshold: self.candidate_threshold,
                iou_threshold: self.iou_threshold,
                max_detections: MAX_DETECTIONS,
            };
            Ok(decode_predictions(data, layout, &self.labels, &params))
        }
    }
}
