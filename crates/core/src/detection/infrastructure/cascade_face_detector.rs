//! Multi-scale sliding-window face detector over a Haar cascade.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_region::FaceRegion;
use crate::detection::domain::haar_cascade::{CascadeError, HaarCascade};
use crate::detection::domain::integral_image::IntegralImage;
use crate::detection::infrastructure::{cascade_loader, math};
use crate::shared::bounding_box::{BoundingBox, DEFAULT_IOU_THRESHOLD};
use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;

/// Candidate windows overlapping by more than this are grouped together.
const GROUP_LINK_IOU: f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    /// Growth factor between consecutive window scales. Must exceed 1.
    pub scale_factor: f32,
    /// A grouped detection is kept only with more than this many raw hits.
    pub min_neighbors: usize,
    /// Smallest window side, in pixels, that is scanned.
    pub min_size: u32,
    /// Window step as a fraction of the current window width.
    pub step_fraction: f32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: 30,
            step_fraction: 0.1,
        }
    }
}

impl CascadeParams {
    pub fn validate(&self) -> Result<(), CascadeError> {
        if !(self.scale_factor > 1.0) {
            return Err(CascadeError::Invalid(format!(
                "scale factor must exceed 1, got {}",
                self.scale_factor
            )));
        }
        if !(self.step_fraction > 0.0) {
            return Err(CascadeError::Invalid(format!(
                "step fraction must be positive, got {}",
                self.step_fraction
            )));
        }
        Ok(())
    }
}

pub struct CascadeFaceDetector {
    cascade: HaarCascade,
    params: CascadeParams,
    gray: Vec<u8>,
}

impl CascadeFaceDetector {
    pub fn new(cascade: HaarCascade, params: CascadeParams) -> Result<Self, CascadeError> {
        cascade.validate()?;
        params.validate()?;
        Ok(Self {
            cascade,
            params,
            gray: Vec::new(),
        })
    }

    pub fn from_file(path: &Path, params: CascadeParams) -> Result<Self, CascadeError> {
        let cascade = cascade_loader::load(path)?;
        log::info!(
            "Loaded cascade {} ({} stages, {}x{} window)",
            path.display(),
            cascade.stages.len(),
            cascade.window_width,
            cascade.window_height
        );
        Self::new(cascade, params)
    }

    pub fn params(&self) -> &CascadeParams {
        &self.params
    }

    fn scan(&self, ii: &IntegralImage) -> Vec<BoundingBox> {
        let (img_w, img_h) = (ii.width(), ii.height());
        let mut candidates = Vec::new();
        let mut scale = 1.0f32;

        loop {
            let (win_w, win_h) = self.cascade.window_at(scale);
            if win_w > img_w || win_h > img_h {
                break;
            }
            if win_w >= self.params.min_size as usize && win_h >= self.params.min_size as usize {
                let step = ((win_w as f32 * self.params.step_fraction).round() as usize).max(1);
                for y in (0..=img_h - win_h).step_by(step) {
                    for x in (0..=img_w - win_w).step_by(step) {
                        if self.cascade.evaluate(ii, x, y, scale) {
                            candidates.push(BoundingBox::new(
                                x as i32,
                                y as i32,
                                win_w as i32,
                                win_h as i32,
                            ));
                        }
                    }
                }
            }
            scale *= self.params.scale_factor;
        }

        candidates
    }
}

impl FaceDetector for CascadeFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError> {
        to_luma(frame, &mut self.gray)?;
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }

        let ii = IntegralImage::new(&self.gray, w, h);
        let candidates = self.scan(&ii);

        let kept: Vec<BoundingBox> = math::cluster_boxes(&candidates, GROUP_LINK_IOU)
            .into_iter()
            .filter(|c| c.members > self.params.min_neighbors)
            .filter_map(|c| c.bbox.clamp_to(frame.width(), frame.height()))
            .collect();
        let mut boxes = BoundingBox::deduplicate(&kept, DEFAULT_IOU_THRESHOLD);
        boxes.sort_by_key(|b| (b.y, b.x));

        log::debug!(
            "Frame {}: {} candidate windows, {} faces",
            frame.sequence(),
            candidates.len(),
            boxes.len()
        );

        boxes
            .into_iter()
            .map(|bbox| FaceRegion::from_frame(frame, bbox))
            .collect()
    }
}

/// Converts packed gray, RGB or RGBA pixels to 8-bit luma in `out`.
fn to_luma(frame: &Frame, out: &mut Vec<u8>) -> Result<(), DetectionError> {
    let data = frame.data();
    out.clear();
    match frame.channels() {
        1 => out.extend_from_slice(data),
        c @ (3 | 4) => out.extend(data.chunks_exact(c as usize).map(|px| {
            ((77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8) as u8
        })),
        channels => return Err(DetectionError::UnsupportedLayout { channels }),
    }
    Ok(())
}
