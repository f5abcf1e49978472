use std::path::Path;

use crate::classification::domain::gender_classifier::{Gender, GenderClassifier};
use crate::classification::infrastructure::onnx_classifier_session::{
    argmax, OnnxClassifierSession,
};
use crate::shared::error::ClassificationError;
use crate::shared::frame::Frame;

/// Output classes of the gender model, in score order.
pub const GENDER_CLASSES: [Gender; 2] = [Gender::Male, Gender::Female];

/// Gender classifier backed by an ONNX gender model.
pub struct OnnxGenderClassifier {
    session: OnnxClassifierSession,
}

impl OnnxGenderClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: OnnxClassifierSession::new(model_path)?,
        })
    }

    /// Loads `sessions` copies of the model so that many faces can be
    /// scored at once.
    pub fn with_sessions(model_path: &Path, sessions: usize) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: OnnxClassifierSession::with_sessions(model_path, sessions)?,
        })
    }
}

impl GenderClassifier for OnnxGenderClassifier {
    fn predict(&self, face: &Frame, _context: &Frame) -> Result<Gender, ClassificationError> {
        gender_from_scores(&self.session.scores(face)?)
    }
}

pub(crate) fn gender_from_scores(scores: &[f32]) -> Result<Gender, ClassificationError> {
    if scores.len() != GENDER_CLASSES.len() {
        return Err(ClassificationError::UnexpectedOutput {
            expected: GENDER_CLASSES.len(),
            actual: scores.len(),
        });
    }
    argmax(scores)
        .map(|i| GENDER_CLASSES[i])
        .ok_or(ClassificationError::UnexpectedOutput {
            expected: GENDER_CLASSES.len(),
            actual: 0,
        })
}
