//! Captured frames and the capture-device seam

use crate::error::EyeError;
use image::{ImageFormat, RgbImage};
use std::path::Path;

/// One still image from the capture device, RGB8.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Uniform colour frame, handy for synthetic sources.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode as JPEG at `path`.
    pub fn write_jpeg(&self, path: &Path) -> Result<(), EyeError> {
        self.image.save_with_format(path, ImageFormat::Jpeg)?;
        Ok(())
    }
}

/// A device yielding frames until it fails.
///
/// Any error from `read_frame` is treated as the device being gone.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Frame, EyeError>;

    /// Give the device back. Called once when the loop stops.
    fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_frame() {
        let frame = Frame::solid(4, 3, [10, 20, 30]);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.image().get_pixel(2, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_write_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        Frame::solid(16, 16, [200, 10, 10]).write_jpeg(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_write_jpeg_into_missing_dir_fails() {
        let result = Frame::solid(2, 2, [0, 0, 0]).write_jpeg(Path::new("/no/such/dir/f.jpg"));
        assert!(result.is_err());
    }
}
