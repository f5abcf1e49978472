use crate::detection::domain::face_region::FaceRegion;
use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;

/// Domain interface for face localization.
///
/// An empty result is a normal outcome (no faces in view). Implementations
/// may keep scratch buffers between calls, hence `&mut self`, but must not
/// carry detections from one frame to the next.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError>;
}
