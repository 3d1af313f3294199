use std::path::{Path, PathBuf};
use tracing::warn;

/// Local JPEG staged for upload; removed when dropped.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve `temp_<uuid>.jpg` inside `dir`. Nothing is written yet.
    pub fn new(dir: &Path) -> Self {
        let name = format!("temp_{}.jpg", uuid::Uuid::new_v4().simple());
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove scratch file {}: {}", self.path.display(), e),
        }
    }
}
