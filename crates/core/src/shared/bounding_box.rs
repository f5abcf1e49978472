pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// Axis-aligned box in frame-pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// True when the box has positive size and lies fully inside a
    /// `frame_w` x `frame_h` frame.
    pub fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.right() as i64 <= frame_w as i64
            && self.bottom() as i64 <= frame_h as i64
    }

    /// Intersects the box with the frame. `None` when nothing is left.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.right() as i64).min(frame_w as i64) as i32;
        let y2 = (self.bottom() as i64).min(frame_h as i64) as i32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Greedy deduplication: keeps a box only if its IoU with every
    /// previously-kept box is at or below the threshold.
    pub fn deduplicate(boxes: &[BoundingBox], iou_threshold: f64) -> Vec<BoundingBox> {
        if boxes.len() <= 1 {
            return boxes.to_vec();
        }
        let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
        for b in boxes {
            let dominated = kept.iter().any(|k| b.iou(k) > iou_threshold);
            if !dominated {
                kept.push(*b);
            }
        }
        kept
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.area() as f64;
        let area_b = other.area() as f64;
        inter / (area_a + area_b - inter)
    }
}
