use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;

/// A detected face: its box in frame coordinates plus an eagerly
/// materialized crop of those pixels.
#[derive(Clone, Debug)]
pub struct FaceRegion {
    bbox: BoundingBox,
    crop: Frame,
}

impl FaceRegion {
    /// Crops `bbox` out of `frame`. The box must have positive size and
    /// lie fully inside the frame.
    pub fn from_frame(frame: &Frame, bbox: BoundingBox) -> Result<Self, DetectionError> {
        if !bbox.fits_within(frame.width(), frame.height()) {
            return Err(DetectionError::RegionOutOfBounds {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }
        Ok(Self {
            bbox,
            crop: frame.crop(&bbox),
        })
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn crop(&self) -> &Frame {
        &self.crop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![50u8; (w * h * 3) as usize], w, h, 3, 0)
    }

    #[test]
    fn test_crop_matches_box_size() {
        let region = FaceRegion::from_frame(&frame(680, 480), BoundingBox::new(100, 100, 50, 50))
            .unwrap();
        assert_eq!(region.crop().width(), 50);
        assert_eq!(region.crop().height(), 50);
        assert_eq!(region.bbox(), &BoundingBox::new(100, 100, 50, 50));
    }

    #[test]
    fn test_box_past_frame_edge_is_rejected() {
        let result = FaceRegion::from_frame(&frame(100, 100), BoundingBox::new(80, 80, 30, 30));
        assert!(matches!(
            result,
            Err(DetectionError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_empty_box_is_rejected() {
        let result = FaceRegion::from_frame(&frame(100, 100), BoundingBox::new(10, 10, 0, 5));
        assert!(result.is_err());
    }
}
