use crate::rendering::annotated_frame::AnnotatedFrame;
use crate::shared::error::DisplayError;

/// Presentation surface for annotated frames.
///
/// Owned by the presentation thread; the processing worker only ever
/// enqueues frames for it, so `present` may take as long as it needs
/// without stalling capture.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<(), DisplayError>;

    /// Tears down display resources. Called once, after the last frame.
    fn close(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}
