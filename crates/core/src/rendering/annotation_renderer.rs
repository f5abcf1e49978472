//! Burns face boxes and `{gender}:[{low}-{high}]` captions into a copy of
//! the frame.
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::classification::domain::classification::Classification;
use crate::detection::domain::face_region::FaceRegion;
use crate::rendering::annotated_frame::{AnnotatedFrame, Caption};
use crate::shared::constants::CAPTION_OFFSET;
use crate::shared::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const TEXT_SCALE: f32 = 16.0;

/// DejaVu Sans Mono, see `assets/DejaVuSansMono-LICENSE.txt`.
static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

#[derive(Error, Debug)]
pub enum FontError {
    #[error("failed to read font file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid font: {0}")]
    Invalid(#[from] ab_glyph::InvalidFont),
}

/// Stateless apart from the caption font. [`AnnotationRenderer::new`] uses
/// the bundled monospace font; a custom one can be loaded from disk.
#[derive(Clone)]
pub struct AnnotationRenderer {
    font: Option<FontArc>,
}

impl Default for AnnotationRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationRenderer {
    pub fn new() -> Self {
        let font = FontArc::try_from_slice(DEFAULT_FONT)
            .map_err(|e| log::warn!("Bundled caption font unusable, captions disabled: {e}"))
            .ok();
        Self { font }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    pub fn load_font(path: &Path) -> Result<FontArc, FontError> {
        let bytes = std::fs::read(path)?;
        Ok(FontArc::try_from_vec(bytes)?)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draws every face onto a copy of `frame`. The input frame is never
    /// modified and an empty `faces` list yields an identical copy.
    pub fn annotate(&self, frame: &Frame, faces: &[(FaceRegion, Classification)]) -> AnnotatedFrame {
        if faces.is_empty() {
            return AnnotatedFrame::new(frame.clone(), Vec::new(), Vec::new());
        }
        if frame.channels() != 3 {
            log::warn!(
                "Frame {}: cannot annotate {}-channel frame, passing through",
                frame.sequence(),
                frame.channels()
            );
            return AnnotatedFrame::new(frame.clone(), Vec::new(), Vec::new());
        }

        let Some(mut canvas): Option<RgbImage> =
            ImageBuffer::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        else {
            log::warn!(
                "Frame {}: buffer does not match {}x{}, passing through",
                frame.sequence(),
                frame.width(),
                frame.height()
            );
            return AnnotatedFrame::new(frame.clone(), Vec::new(), Vec::new());
        };

        let mut boxes = Vec::with_capacity(faces.len());
        let mut captions = Vec::with_capacity(faces.len());

        for (region, classification) in faces {
            let bbox = *region.bbox();
            draw_box(&mut canvas, bbox.x, bbox.y, bbox.width, bbox.height);

            let caption = Caption {
                text: classification.caption(),
                x: (bbox.x - CAPTION_OFFSET).clamp(0, frame.width() as i32 - 1),
                y: (bbox.y - CAPTION_OFFSET).clamp(0, frame.height() as i32 - 1),
            };
            if let Some(font) = &self.font {
                draw_caption(&mut canvas, font, &caption);
            }

            boxes.push(bbox);
            captions.push(caption);
        }

        let annotated = Frame::new(
            canvas.into_raw(),
            frame.width(),
            frame.height(),
            frame.channels(),
            frame.sequence(),
        )
        .with_captured_at(frame.captured_at());
        AnnotatedFrame::new(annotated, boxes, captions)
    }
}

/// Outline from (x, y) to (x + w, y + h) inclusive, thickened inwards.
fn draw_box(canvas: &mut RgbImage, x: i32, y: i32, w: i32, h: i32) {
    for inset in 0..BOX_THICKNESS {
        let (iw, ih) = (w + 1 - 2 * inset, h + 1 - 2 * inset);
        if iw <= 0 || ih <= 0 {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(iw as u32, ih as u32);
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
    }
}

/// Text sits on the anchor; it is pushed down if it would leave the top edge.
fn draw_caption(canvas: &mut RgbImage, font: &FontArc, caption: &Caption) {
    let scale = PxScale::from(TEXT_SCALE);
    let (_, text_h) = text_size(scale, font, &caption.text);
    let top = (caption.y - text_h as i32).max(0);
    draw_text_mut(canvas, TEXT_COLOR, caption.x, top, scale, font, &caption.text);
}
