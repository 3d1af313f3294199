//! Error types for moodcam-eye

use moodcam_archive::ArchiveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EyeError {
    /// Capture device unreadable; stops the loop
    #[error("Camera error: {0}")]
    Device(String),

    /// Detector invocation failed; fatal
    #[error("Model error: {0}")]
    Model(String),

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("Detection thread panicked")]
    Panicked,
}

impl EyeError {
    /// Errors that end the detection loop rather than a single tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EyeError::Device(_)
                | EyeError::Model(_)
                | EyeError::Config(_)
                | EyeError::OpenCv(_)
                | EyeError::Panicked
        )
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for EyeError {
    fn from(err: opencv::Error) -> Self {
        EyeError::OpenCv(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eye_error_display() {
        let err = EyeError::Device("Camera 0 failed to open".to_string());
        assert!(err.to_string().contains("Camera error"));
        assert!(err.to_string().contains("Camera 0"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EyeError::Device("gone".into()).is_fatal());
        assert!(EyeError::Model("bad tensor".into()).is_fatal());
        assert!(!EyeError::Frame("encode".into()).is_fatal());
        assert!(!EyeError::Archive(ArchiveError::Storage("503".into())).is_fatal());
        assert!(!EyeError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).is_fatal());
    }

    #[test]
    fn test_from_archive_error() {
        let err: EyeError = ArchiveError::Query("down".to_string()).into();
        assert!(matches!(err, EyeError::Archive(ArchiveError::Query(_))));
    }
}
