use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::pipeline_state::PipelineState;

/// Failure reading one frame from the capture device.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture source is not open")]
    NotOpen,
    #[error("capture device reached end of stream")]
    EndOfStream,
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("failed to read frame from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Failure locating faces in one frame.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("unsupported frame layout: {channels} channels")]
    UnsupportedLayout { channels: u8 },
    #[error("region {x},{y} {width}x{height} lies outside the {frame_width}x{frame_height} frame")]
    RegionOutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("face scan failed: {0}")]
    Scan(String),
}

/// Failure estimating age or gender for one face.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("face crop is empty")]
    EmptyCrop,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output length {actual}, expected {expected}")]
    UnexpectedOutput { expected: usize, actual: usize },
}

/// Failure that prevents the pipeline from entering `Running`.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to open capture device {device}: {reason}")]
    DeviceOpen { device: String, reason: String },
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),
    #[error("pipeline cannot start from state {0}")]
    InvalidState(PipelineState),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while releasing pipeline resources. Logged, never propagated.
#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("failed to release capture device: {0}")]
    Release(String),
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
    #[error("display sink failed to close: {0}")]
    Display(#[source] DisplayError),
    #[error("event sink failed to flush: {0}")]
    Events(#[source] EventSinkError),
}

/// Failure updating the presentation surface.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("annotated frame has an unsupported layout: {channels} channels")]
    UnsupportedLayout { channels: u8 },
    #[error("failed to write display frame to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Failure recording a detection event.
#[derive(Error, Debug)]
pub enum EventSinkError {
    #[error("event log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to save snapshot to {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },
}
