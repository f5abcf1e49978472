use crate::events::domain::detection_event::DetectionEvent;
use crate::shared::error::EventSinkError;

/// Destination for detection events. Failures are logged by the caller
/// and never reach the processing loop.
pub trait EventSink: Send {
    fn record(&mut self, event: &DetectionEvent) -> Result<(), EventSinkError>;

    fn flush(&mut self) -> Result<(), EventSinkError> {
        Ok(())
    }
}
