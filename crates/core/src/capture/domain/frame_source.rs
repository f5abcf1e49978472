use crate::capture::domain::capture_config::CaptureConfig;
use crate::shared::error::{CaptureError, ShutdownError, StartupError};
use crate::shared::frame::Frame;

/// A live frame producer.
///
/// `next_frame` blocks until the device delivers a frame. Sources never
/// recover on their own: after a `CaptureError` the caller simply asks
/// again on its next cycle.
pub trait FrameSource: Send {
    /// Opens the device at the configured, immutable resolution.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), StartupError>;

    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self) -> Result<(), ShutdownError>;
}
