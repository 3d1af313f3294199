//! USB webcam capture through OpenCV

use crate::error::EyeError;
use crate::frame::{Frame, FrameSource};
use image::RgbImage;
use moodcam_core::CameraConfig;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use tracing::{info, warn};

/// Owns the capture device for the lifetime of the loop.
pub struct OpenCvCamera {
    device_index: u32,
    capture: Option<VideoCapture>,
}

impl OpenCvCamera {
    /// Open and configure the camera
    pub fn open(config: &CameraConfig) -> Result<Self, EyeError> {
        let index = config.device_index;
        let mut capture = VideoCapture::new(index as i32, CAP_ANY)
            .map_err(|e| EyeError::Device(format!("Failed to open camera {}: {}", index, e)))?;

        if !capture
            .is_opened()
            .map_err(|e| EyeError::Device(format!("Camera {} not opened: {}", index, e)))?
        {
            return Err(EyeError::Device(format!("Camera {} failed to open", index)));
        }

        let (width, height) = config.resolution;
        // backends may ignore these; the frames report their real size
        for (prop, value, name) in [
            (CAP_PROP_FRAME_WIDTH, width as f64, "width"),
            (CAP_PROP_FRAME_HEIGHT, height as f64, "height"),
            (CAP_PROP_FPS, config.frame_rate as f64, "fps"),
        ] {
            if let Err(e) = capture.set(prop, value) {
                warn!("Camera {} rejected {} = {}: {}", index, name, value, e);
            }
        }

        info!(
            "Camera {} initialized at {}x{} @ {}fps",
            index, width, height, config.frame_rate
        );

        Ok(Self {
            device_index: index,
            capture: Some(capture),
        })
    }
}

impl FrameSource for OpenCvCamera {
    fn read_frame(&mut self) -> Result<Frame, EyeError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| EyeError::Device("Camera not initialized".to_string()))?;

        let mut mat = Mat::default();
        let grabbed = capture
            .read(&mut mat)
            .map_err(|e| EyeError::Device(format!("Failed to read frame: {}", e)))?;
        if !grabbed || mat.rows() == 0 || mat.cols() == 0 {
            return Err(EyeError::Device(format!(
                "Camera {} returned no frame",
                self.device_index
            )));
        }

        mat_to_frame(&mat)
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!("Failed to release camera {}: {}", self.device_index, e);
            }
            info!("Camera {} released", self.device_index);
        }
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        self.release();
    }
}

/// BGR `Mat` to an RGB frame.
fn mat_to_frame(mat: &Mat) -> Result<Frame, EyeError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = if rgb.is_continuous() {
        rgb.data_bytes()?.to_vec()
    } else {
        rgb.try_clone()?.data_bytes()?.to_vec()
    };

    RgbImage::from_raw(width, height, bytes)
        .map(Frame::new)
        .ok_or_else(|| EyeError::Frame(format!("Unexpected frame layout {}x{}", width, height)))
}
