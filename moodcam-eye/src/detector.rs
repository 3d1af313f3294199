//! Detector adapter seam

use crate::error::EyeError;
use crate::frame::Frame;
use moodcam_core::RawDetection;

/// Wraps an external model: one frame in, labeled boxes out.
///
/// Boxes come back in the model's own order; the loop only ever looks at
/// the first one that clears the confidence threshold.
#[cfg_attr(test, mockall::automock)]
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, EyeError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, EyeError> {
        (**self).detect(frame)
    }
}
