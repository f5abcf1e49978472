use std::time::Instant;

use crate::classification::domain::classification::Classification;
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::face_classification::FaceClassifier;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_stats::PipelineStats;
use crate::rendering::annotated_frame::AnnotatedFrame;
use crate::rendering::annotation_renderer::AnnotationRenderer;
use crate::shared::frame::Frame;

/// Output of one cycle: the annotated frame plus the classifications that
/// made it onto it, in detection order.
pub struct ProcessedFrame {
    pub annotated: AnnotatedFrame,
    pub classifications: Vec<Classification>,
}

/// Detect, classify and annotate for a single frame.
///
/// Never fails: a detection error yields an unannotated frame and a
/// classification error drops only that face.
pub struct FrameCycle {
    detector: Box<dyn FaceDetector>,
    classifier: FaceClassifier,
    renderer: AnnotationRenderer,
}

impl FrameCycle {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        classifier: FaceClassifier,
        renderer: AnnotationRenderer,
    ) -> Self {
        Self {
            detector,
            classifier,
            renderer,
        }
    }

    pub fn process(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
        stats: &PipelineStats,
    ) -> ProcessedFrame {
        let t0 = Instant::now();
        let faces = match self.detector.detect(frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Frame {}: detection failed: {e}", frame.sequence());
                PipelineStats::incr(&stats.detection_failures);
                Vec::new()
            }
        };
        logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);
        logger.metric("faces", faces.len() as f64);
        PipelineStats::add(&stats.faces_detected, faces.len() as u64);

        let t1 = Instant::now();
        let results = self.classifier.classify_all(&faces, frame);
        let mut classified = Vec::with_capacity(faces.len());
        for (index, (face, result)) in faces.into_iter().zip(results).enumerate() {
            match result {
                Ok(classification) => {
                    log::debug!(
                        "Frame {}: face {index} {}",
                        frame.sequence(),
                        classification.caption()
                    );
                    classified.push((face, classification));
                }
                Err(e) => {
                    log::warn!(
                        "Frame {}: skipping face {index} at {:?}: {e}",
                        frame.sequence(),
                        face.bbox()
                    );
                    PipelineStats::incr(&stats.classification_failures);
                }
            }
        }
        PipelineStats::add(&stats.faces_classified, classified.len() as u64);
        logger.timing("classify", t1.elapsed().as_secs_f64() * 1000.0);

        let t2 = Instant::now();
        let annotated = self.renderer.annotate(frame, &classified);
        logger.timing("annotate", t2.elapsed().as_secs_f64() * 1000.0);

        ProcessedFrame {
            annotated,
            classifications: classified.into_iter().map(|(_, c)| c).collect(),
        }
    }
}
