//! Boosted cascade of Haar-like features (Viola-Jones).
//!
//! The model is a sequence of stages, each a sum of depth-one decision
//! stumps over weighted rectangle features. A window is accepted only if
//! every stage's stump sum reaches that stage's threshold, so most
//! background windows are rejected by the first one or two stages.
//!
//! Models load from OpenCV's `haarcascade_*.xml` files (see
//! `cascade_loader`) or from this crate's JSON layout:
//!
//! ```json
//! {
//!   "window_width": 24, "window_height": 24,
//!   "stages": [{
//!     "threshold": 0.8,
//!     "classifiers": [{
//!       "feature": { "rects": [{ "x": 2, "y": 4, "width": 20, "height": 8, "weight": -1.0 }] },
//!       "threshold": 0.01, "left": 0.2, "right": 0.9
//!     }]
//!   }]
//! }
//! ```
//!
//! `norm_inset` (default 0) shrinks the region used for variance
//! normalization by that many base-window pixels on every side. OpenCV
//! cascades are trained with an inset of 1.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::integral_image::IntegralImage;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse cascade: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to parse cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid cascade: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// Decision stump: `left` when the normalized feature is below
/// `threshold`, `right` otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeakClassifier {
    pub feature: HaarFeature,
    pub threshold: f32,
    pub left: f32,
    pub right: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub threshold: f32,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HaarCascade {
    pub window_width: u32,
    pub window_height: u32,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub norm_inset: u32,
}

impl HaarCascade {
    pub fn from_json(text: &str) -> Result<Self, CascadeError> {
        let cascade: HaarCascade = serde_json::from_str(text)?;
        cascade.validate()?;
        Ok(cascade)
    }

    /// Checks that the window is non-empty, there is at least one stage,
    /// and every feature rectangle lies inside the base window.
    pub fn validate(&self) -> Result<(), CascadeError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(CascadeError::Invalid("window size must be positive".into()));
        }
        if self.stages.is_empty() {
            return Err(CascadeError::Invalid("cascade has no stages".into()));
        }
        for (s, stage) in self.stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(CascadeError::Invalid(format!("stage {s} has no classifiers")));
            }
            for classifier in &stage.classifiers {
                for r in &classifier.feature.rects {
                    let fits = |start: u32, len: u32, limit: u32| {
                        len > 0 && start.checked_add(len).is_some_and(|end| end <= limit)
                    };
                    if !fits(r.x, r.width, self.window_width)
                        || !fits(r.y, r.height, self.window_height)
                    {
                        return Err(CascadeError::Invalid(format!(
                            "stage {s} has a rectangle outside the {}x{} window",
                            self.window_width, self.window_height
                        )));
                    }
                }
            }
        }
        if self.norm_inset.saturating_mul(2) >= self.window_width.min(self.window_height) {
            return Err(CascadeError::Invalid(format!(
                "normalization inset {} leaves nothing of the {}x{} window",
                self.norm_inset, self.window_width, self.window_height
            )));
        }
        Ok(())
    }

    /// Window side lengths at `scale`, rounded to whole pixels.
    pub fn window_at(&self, scale: f32) -> (usize, usize) {
        (
            (self.window_width as f32 * scale).round() as usize,
            (self.window_height as f32 * scale).round() as usize,
        )
    }

    /// Runs every stage on the window whose top-left corner is `(x, y)`.
    ///
    /// Feature sums are divided by the area of the normalization region and
    /// its pixel standard deviation (floored at 1) so thresholds are
    /// independent of lighting and scale. The window must lie inside the
    /// integral image.
    pub fn evaluate(&self, ii: &IntegralImage, x: usize, y: usize, scale: f32) -> bool {
        let (win_w, win_h) = self.window_at(scale);
        if win_w == 0 || win_h == 0 || x + win_w > ii.width() || y + win_h > ii.height() {
            return false;
        }

        let inset = ((self.norm_inset as f32 * scale).round() as usize)
            .min((win_w.min(win_h) - 1) / 2);
        let (nx, ny) = (x + inset, y + inset);
        let (nw, nh) = (win_w - 2 * inset, win_h - 2 * inset);
        let area = (nw * nh) as f64;
        let mean = ii.rect_sum(nx, ny, nw, nh) as f64 / area;
        let variance = ii.rect_sq_sum(nx, ny, nw, nh) as f64 / area - mean * mean;
        let std = variance.max(0.0).sqrt().max(1.0);
        let norm = area * std;

        for stage in &self.stages {
            let mut total = 0.0f32;
            for classifier in &stage.classifiers {
                let value = self.feature_value(ii, &classifier.feature, x, y, scale, win_w, win_h)
                    / norm;
                total += if (value as f32) < classifier.threshold {
                    classifier.left
                } else {
                    classifier.right
                };
            }
            if total < stage.threshold {
                return false;
            }
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn feature_value(
        &self,
        ii: &IntegralImage,
        feature: &HaarFeature,
        x: usize,
        y: usize,
        scale: f32,
        win_w: usize,
        win_h: usize,
    ) -> f64 {
        feature
            .rects
            .iter()
            .map(|r| {
                let rx = ((r.x as f32 * scale).round() as usize).min(win_w - 1);
                let ry = ((r.y as f32 * scale).round() as usize).min(win_h - 1);
                let rw = ((r.width as f32 * scale).round() as usize).clamp(1, win_w - rx);
                let rh = ((r.height as f32 * scale).round() as usize).clamp(1, win_h - ry);
                r.weight as f64 * ii.rect_sum(x + rx, y + ry, rw, rh) as f64
            })
            .sum()
    }
}
