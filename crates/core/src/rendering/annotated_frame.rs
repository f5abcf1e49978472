use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Caption text and the anchor it was placed at. The anchor is the
/// bottom-left corner of the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caption {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

/// A frame copy with boxes and captions burned in, plus a record of
/// what was drawn.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    frame: Frame,
    boxes: Vec<BoundingBox>,
    captions: Vec<Caption>,
}

impl AnnotatedFrame {
    pub fn new(frame: Frame, boxes: Vec<BoundingBox>, captions: Vec<Caption>) -> Self {
        Self {
            frame,
            boxes,
            captions,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }
}
