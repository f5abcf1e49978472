use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    DEFAULT_CAPTURE_DEVICE, DEFAULT_CAPTURE_FORMAT, DEFAULT_FPS, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_WIDTH,
};
use crate::shared::error::StartupError;

/// Device settings fixed for the lifetime of a capture session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device node, URL or directory, depending on the source.
    pub device: String,
    /// Demuxer/input-device name (e.g. `video4linux2`). `None` lets the
    /// backend detect it.
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAPTURE_DEVICE.to_string(),
            format: Some(DEFAULT_CAPTURE_FORMAT.to_string()),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.device.is_empty() {
            return Err(StartupError::InvalidConfig("device must not be empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StartupError::InvalidConfig(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(StartupError::InvalidConfig("fps must be positive".into()));
        }
        Ok(())
    }

    pub fn video_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_camera_setup() {
        let config = CaptureConfig::default();
        assert_eq!(config.device, "/dev/video0");
        assert_eq!(config.format.as_deref(), Some("video4linux2"));
        assert_eq!(config.video_size(), "680x480");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_resolution_is_rejected() {
        let config = CaptureConfig {
            width: 0,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StartupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"device": "/dev/video2"}"#).unwrap();
        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.width, 680);
        assert_eq!(config.fps, 30);
    }
}
