use chrono::{DateTime, Local};

use crate::shared::bounding_box::BoundingBox;

/// A single captured frame: contiguous pixel bytes in row-major order.
///
/// Frames are immutable once built. Annotation works on a copy, and crops
/// are materialized into their own buffers.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
            captured_at: Local::now(),
        }
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Local>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copies the pixels under `bbox` into a new frame.
    ///
    /// The box is clamped to the frame first; the crop inherits the
    /// sequence number and capture time of its source.
    pub fn crop(&self, bbox: &BoundingBox) -> Frame {
        let Some(b) = bbox.clamp_to(self.width, self.height) else {
            return Frame::new(Vec::new(), 0, 0, self.channels, self.sequence)
                .with_captured_at(self.captured_at);
        };

        let channels = self.channels as usize;
        let fw = self.width as usize;
        let (x, y, w, h) = (b.x as usize, b.y as usize, b.width as usize, b.height as usize);

        let mut data = Vec::with_capacity(w * h * channels);
        for row in y..y + h {
            let start = (row * fw + x) * channels;
            data.extend_from_slice(&self.data[start..start + w * channels]);
        }

        Frame::new(data, w as u32, h as u32, self.channels, self.sequence)
            .with_captured_at(self.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        Frame::new(data, width, height, 3, 9)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.sequence(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        let data = vec![0u8; 10]; // wrong size for 2x2x3
        Frame::new(data, 2, 2, 3, 0);
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient_frame(10, 10);
        let crop = frame.crop(&BoundingBox::new(2, 3, 4, 5));
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 5);
        assert_eq!(crop.sequence(), 9);
        assert_eq!(crop.captured_at(), frame.captured_at());
        let px = |x: usize, y: usize| &crop.data()[(y * 4 + x) * 3..][..3];
        assert_eq!(px(0, 0), &[2, 3, 7]);
        assert_eq!(px(3, 4), &[5, 7, 7]);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = gradient_frame(10, 10);
        let crop = frame.crop(&BoundingBox::new(8, 8, 5, 5));
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
    }

    #[test]
    fn test_crop_outside_frame_is_empty() {
        let frame = gradient_frame(10, 10);
        let crop = frame.crop(&BoundingBox::new(20, 20, 5, 5));
        assert!(crop.is_empty());
        assert!(crop.data().is_empty());
    }

    #[test]
    fn test_crop_does_not_touch_source() {
        let frame = gradient_frame(6, 6);
        let before = frame.data().to_vec();
        let _ = frame.crop(&BoundingBox::new(1, 1, 3, 3));
        assert_eq!(frame.data(), &before[..]);
    }
}
