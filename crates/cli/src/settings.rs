use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use face_monitor_core::capture::domain::capture_config::CaptureConfig;
use face_monitor_core::detection::infrastructure::cascade_face_detector::CascadeParams;

/// Run settings, read from a JSON file. Missing keys take their defaults and
/// command-line flags override whatever the file says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capture: CaptureConfig,
    /// Replay this directory of images instead of opening a device.
    pub images: Option<PathBuf>,
    pub cascade: Option<PathBuf>,
    pub age_model: Option<PathBuf>,
    pub gender_model: Option<PathBuf>,
    /// Directory searched for bundled models before downloading.
    pub models_dir: Option<PathBuf>,
    pub font: Option<PathBuf>,
    /// Image file kept updated with the latest annotated frame.
    pub display_out: Option<PathBuf>,
    pub viewport: Option<(u32, u32)>,
    pub events: Option<PathBuf>,
    pub snapshots: Option<PathBuf>,
    pub workers: Option<usize>,
    pub scale_factor: f32,
    pub min_neighbors: usize,
    pub min_face_size: u32,
    pub log_every: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let params = CascadeParams::default();
        Self {
            capture: CaptureConfig::default(),
            images: None,
            cascade: None,
            age_model: None,
            gender_model: None,
            models_dir: None,
            font: None,
            display_out: None,
            viewport: None,
            events: None,
            snapshots: None,
            workers: None,
            scale_factor: params.scale_factor,
            min_neighbors: params.min_neighbors,
            min_face_size: params.min_size,
            log_every: 100,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Face Monitor").join("settings.json"))
    }

    /// Reads the per-user settings file, falling back to defaults when it
    /// is missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Reads an explicitly requested settings file. Unlike [`load`](Self::load),
    /// a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read settings {}: {e}", path.display()))?;
        serde_json::from_str(&json)
            .map_err(|e| format!("Invalid settings {}: {e}", path.display()))
    }

    pub fn cascade_params(&self) -> CascadeParams {
        CascadeParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: self.min_face_size,
            ..CascadeParams::default()
        }
    }
}

/// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
pub fn parse_viewport(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Viewport must look like 1280x720, got '{s}'"))?;
    let w: u32 = w
        .trim()
        .parse()
        .map_err(|_| format!("Invalid viewport width in '{s}'"))?;
    let h: u32 = h
        .trim()
        .parse()
        .map_err(|_| format!("Invalid viewport height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("Viewport must be non-zero, got '{s}'"));
    }
    Ok((w, h))
}
