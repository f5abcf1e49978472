use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::display::domain::display_sink::DisplaySink;
use crate::rendering::annotated_frame::AnnotatedFrame;
use crate::shared::error::DisplayError;

/// Keeps a single image file updated with the most recent annotated frame,
/// scaled to fit a viewport.
///
/// Each update is written to a sibling temp file and renamed into place, so
/// a viewer polling the file never sees a partial image.
pub struct ImageFileDisplaySink {
    path: PathBuf,
    tmp_path: PathBuf,
    format: ImageFormat,
    viewport: Option<(u32, u32)>,
}

impl ImageFileDisplaySink {
    /// The image format is taken from the file extension.
    pub fn new(path: &Path, viewport: Option<(u32, u32)>) -> Result<Self, DisplayError> {
        let format = ImageFormat::from_path(path).map_err(|e| DisplayError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DisplayError::Write {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!(".{file_name}.part"));
        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            format,
            viewport,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, reason: impl ToString) -> DisplayError {
        DisplayError::Write {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl DisplaySink for ImageFileDisplaySink {
    fn present(&mut self, annotated: &AnnotatedFrame) -> Result<(), DisplayError> {
        let frame = annotated.frame();
        if frame.channels() != 3 {
            return Err(DisplayError::UnsupportedLayout {
                channels: frame.channels(),
            });
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| self.write_err("frame buffer does not match its dimensions"))?;

        let img = match self.viewport {
            Some((vw, vh)) => {
                let (w, h) = fit_within(frame.width(), frame.height(), vw, vh);
                if (w, h) == (frame.width(), frame.height()) {
                    img
                } else {
                    image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle)
                }
            }
            None => img,
        };

        img.save_with_format(&self.tmp_path, self.format)
            .map_err(|e| self.write_err(e))?;
        std::fs::rename(&self.tmp_path, &self.path).map_err(|e| self.write_err(e))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        if self.tmp_path.exists() {
            std::fs::remove_file(&self.tmp_path).map_err(|e| self.write_err(e))?;
        }
        Ok(())
    }
}

/// Largest size with the source aspect ratio that fits in the viewport.
pub fn fit_within(width: u32, height: u32, viewport_w: u32, viewport_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 || viewport_w == 0 || viewport_h == 0 {
        return (width, height);
    }
    let scale = f64::min(
        viewport_w as f64 / width as f64,
        viewport_h as f64 / height as f64,
    );
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}
