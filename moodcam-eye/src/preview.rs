//! Optional interactive preview
//!
//! The loop hands every captured frame, together with the boxes of the most
//! recent detector run, to a [`Preview`]. Headless runs use [`NoPreview`].

use crate::error::EyeError;
use crate::frame::Frame;
use moodcam_core::RawDetection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewControl {
    Continue,
    /// Operator asked the loop to stop
    Quit,
}

pub trait Preview: Send {
    fn show(&mut self, frame: &Frame, detections: &[RawDetection]) -> Result<PreviewControl, EyeError>;

    fn close(&mut self) {}
}

/// Discards frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPreview;

impl Preview for NoPreview {
    fn show(&mut self, _frame: &Frame, _detections: &[RawDetection]) -> Result<PreviewControl, EyeError> {
        Ok(PreviewControl::Continue)
    }
}

#[cfg(feature = "opencv")]
pub use highgui::HighGuiPreview;

#[cfg(feature = "opencv")]
mod highgui {
    use super::{Preview, PreviewControl};
    use crate::error::EyeError;
    use crate::frame::Frame;
    use moodcam_core::RawDetection;
    use opencv::{
        core::{Mat, Point, Rect, Scalar, CV_8UC3},
        highgui, imgproc,
        prelude::*,
    };

    const QUIT_KEY: i32 = 'q' as i32;

    /// OpenCV window with the detector's boxes drawn on top; `q` quits.
    pub struct HighGuiPreview {
        window: String,
    }

    impl HighGuiPreview {
        pub fn new(window: impl Into<String>) -> Self {
            Self {
                window: window.into(),
            }
        }

        fn to_bgr(frame: &Frame) -> Result<Mat, EyeError> {
            let mut rgb = Mat::new_rows_cols_with_default(
                frame.height() as i32,
                frame.width() as i32,
                CV_8UC3,
                Scalar::all(0.0),
            )?;
            rgb.data_bytes_mut()?.copy_from_slice(frame.image().as_raw());

            let mut bgr = Mat::default();
            imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
            Ok(bgr)
        }
    }

    impl Preview for HighGuiPreview {
        fn show(&mut self, frame: &Frame, detections: &[RawDetection]) -> Result<PreviewControl, EyeError> {
            let mut canvas = Self::to_bgr(frame)?;
            let green = Scalar::new(0.0, 255.0, 0.0, 0.0);

            for d in detections {
                let rect = Rect::new(
                    d.bbox.x1 as i32,
                    d.bbox.y1 as i32,
                    d.bbox.width() as i32,
                    d.bbox.height() as i32,
                );
                imgproc::rectangle(&mut canvas, rect, green, 2, imgproc::LINE_8, 0)?;
                imgproc::put_text(
                    &mut canvas,
                    &format!("{} {:.2}", d.label, d.confidence),
                    Point::new(rect.x, (rect.y - 6).max(12)),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    0.6,
                    green,
                    2,
                    imgproc::LINE_8,
                    false,
                )?;
            }

            highgui::imshow(&self.window, &canvas)?;
            let key = highgui::wait_key(1)?;
            if key & 0xFF == QUIT_KEY {
                Ok(PreviewControl::Quit)
            } else {
                Ok(PreviewControl::Continue)
            }
        }

        fn close(&mut self) {
            let _ = highgui::destroy_window(&self.window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_preview_always_continues() {
        let mut preview = NoPreview;
        let frame = Frame::solid(2, 2, [0, 0, 0]);
        assert_eq!(preview.show(&frame, &[]).unwrap(), PreviewControl::Continue);
        preview.close();
    }
}
