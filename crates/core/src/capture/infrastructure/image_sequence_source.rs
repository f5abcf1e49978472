use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::domain::capture_config::CaptureConfig;
use crate::capture::domain::frame_source::FrameSource;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::error::{CaptureError, ShutdownError, StartupError};
use crate::shared::frame::Frame;

/// Replays a directory of still images as a looping live feed.
///
/// Files are played in name order, paced to the configured frame rate and
/// resized to the configured resolution. Useful without a camera attached.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    width: u32,
    height: u32,
    interval: Duration,
    last_frame_at: Option<Instant>,
    sequence: u64,
}

impl ImageSequenceSource {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            cursor: 0,
            width: 0,
            height: 0,
            interval: Duration::ZERO,
            last_frame_at: None,
            sequence: 0,
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl Default for ImageSequenceSource {
    fn default() -> Self {
        Self::new()
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), StartupError> {
        config.validate()?;

        let dir = Path::new(&config.device);
        let paths = list_images(dir).map_err(|e| StartupError::DeviceOpen {
            device: config.device.clone(),
            reason: e.to_string(),
        })?;
        if paths.is_empty() {
            return Err(StartupError::DeviceOpen {
                device: config.device.clone(),
                reason: "no images found".into(),
            });
        }

        log::debug!("Replaying {} images from {}", paths.len(), dir.display());
        self.paths = paths;
        self.cursor = 0;
        self.width = config.width;
        self.height = config.height;
        self.interval = Duration::from_secs_f64(1.0 / config.fps as f64);
        self.last_frame_at = None;
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.paths.is_empty() {
            return Err(CaptureError::NotOpen);
        }
        self.pace();

        let path = self.paths[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.paths.len();

        let img = image::open(&path)
            .map_err(|source| CaptureError::Read { path, source })?
            .to_rgb8();
        let img = if img.dimensions() == (self.width, self.height) {
            img
        } else {
            image::imageops::resize(
                &img,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            )
        };

        let frame = Frame::new(img.into_raw(), self.width, self.height, 3, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn close(&mut self) -> Result<(), ShutdownError> {
        self.paths.clear();
        self.last_frame_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_image(dir: &Path, name: &str, w: u32, h: u32, value: u8) {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    fn config_for(dir: &Path, width: u32, height: u32) -> CaptureConfig {
        CaptureConfig {
            device: dir.to_string_lossy().into_owned(),
            format: None,
            width,
            height,
            fps: 1000,
        }
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new();
        let result = source.open(&config_for(dir.path(), 32, 24));
        assert!(matches!(result, Err(StartupError::DeviceOpen { .. })));
    }

    #[test]
    fn test_missing_directory_fails_to_open() {
        let mut source = ImageSequenceSource::new();
        let result = source.open(&config_for(Path::new("/nonexistent/frames"), 32, 24));
        assert!(matches!(result, Err(StartupError::DeviceOpen { .. })));
    }

    #[test]
    fn test_replays_in_name_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 32, 24, 200);
        write_image(dir.path(), "a.png", 32, 24, 10);
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequenceSource::new();
        source.open(&config_for(dir.path(), 32, 24)).unwrap();

        let values: Vec<u8> = (0..3)
            .map(|_| source.next_frame().unwrap().data()[0])
            .collect();
        assert_eq!(values, vec![10, 200, 10]);
    }

    #[test]
    fn test_frames_are_resized_to_configured_resolution() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "big.png", 64, 48, 90);

        let mut source = ImageSequenceSource::new();
        source.open(&config_for(dir.path(), 16, 12)).unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 12));
        assert_eq!(frame.sequence(), 0);
        assert_eq!(source.next_frame().unwrap().sequence(), 1);
    }

    #[test]
    fn test_unreadable_image_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();

        let mut source = ImageSequenceSource::new();
        source.open(&config_for(dir.path(), 16, 12)).unwrap();
        assert!(matches!(
            source.next_frame(),
            Err(CaptureError::Read { .. })
        ));
    }

    #[test]
    fn test_close_stops_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", 8, 8, 1);

        let mut source = ImageSequenceSource::new();
        source.open(&config_for(dir.path(), 8, 8)).unwrap();
        source.close().unwrap();
        assert!(matches!(source.next_frame(), Err(CaptureError::NotOpen)));
    }
}
