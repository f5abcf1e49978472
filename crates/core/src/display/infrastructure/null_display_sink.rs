use crate::display::domain::display_sink::DisplaySink;
use crate::rendering::annotated_frame::AnnotatedFrame;
use crate::shared::error::DisplayError;

/// Headless sink: discards frames, counting them at debug level.
#[derive(Default)]
pub struct NullDisplaySink {
    presented: u64,
}

impl NullDisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySink for NullDisplaySink {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<(), DisplayError> {
        self.presented += 1;
        log::debug!(
            "Discarding frame {} ({} faces)",
            frame.frame().sequence(),
            frame.boxes().len()
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        log::debug!("Null display closed after {} frames", self.presented);
        Ok(())
    }
}
