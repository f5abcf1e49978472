use std::path::{Path, PathBuf};

use crate::shared::error::EventSinkError;
use crate::shared::frame::Frame;

/// Saves annotated frames as JPEG files referenced by detection events.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: &Path) -> Result<Self, EventSinkError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `frame` and returns the path it was saved to. The name is
    /// derived from the capture time and sequence number, so one frame
    /// always maps to one file.
    pub fn save(&self, frame: &Frame) -> Result<PathBuf, EventSinkError> {
        let name = format!(
            "{}-{:08}.jpg",
            frame.captured_at().format("%Y%m%d-%H%M%S"),
            frame.sequence()
        );
        let path = self.dir.join(name);

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| EventSinkError::Snapshot {
                path: path.clone(),
                reason: format!(
                    "expected a {}x{} RGB buffer, got {} channels",
                    frame.width(),
                    frame.height(),
                    frame.channels()
                ),
            })?;
        img.save_with_format(&path, image::ImageFormat::Jpeg)
            .map_err(|e| EventSinkError::Snapshot {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }
}
