use std::path::Path;

use crate::classification::domain::age_classifier::{AgeClassifier, AgeRange};
use crate::classification::infrastructure::onnx_classifier_session::{
    argmax, OnnxClassifierSession,
};
use crate::shared::error::ClassificationError;
use crate::shared::frame::Frame;

/// Output classes of the age model, as inclusive year ranges.
pub const AGE_BUCKETS: [(u32, u32); 8] = [
    (0, 2),
    (4, 6),
    (8, 12),
    (15, 20),
    (25, 32),
    (38, 43),
    (48, 53),
    (60, 100),
];

/// Age-range classifier backed by an ONNX age model.
pub struct OnnxAgeClassifier {
    session: OnnxClassifierSession,
}

impl OnnxAgeClassifier {
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

impl AgeClassifier for OnnxAgeClassifier {
    fn predict(&self, face: &Frame, _context: &Frame) -> Result<AgeRange, ClassificationError> {
        age_from_scores(&self.session.scores(face)?)
    }
}

pub(crate) fn age_from_scores(scores: &[f32]) -> Result<AgeRange, ClassificationError> {
    if scores.len() != AGE_BUCKETS.len() {
        return Err(ClassificationError::UnexpectedOutput {
            expected: AGE_BUCKETS.len(),
            actual: scores.len(),
        });
    }
    let (low, high) = argmax(scores)
        .map(|i| AGE_BUCKETS[i])
        .ok_or(ClassificationError::UnexpectedOutput {
            expected: AGE_BUCKETS.len(),
            actual: 0,
        })?;
    AgeRange::new(low, high).ok_or_else(|| {
        ClassificationError::Inference(format!("age bucket {low}-{high} is inverted"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn one_hot(i: usize) -> Vec<f32> {
        let mut v = vec![0.01; AGE_BUCKETS.len()];
        v[i] = 0.9;
        v
    }

    #[rstest]
    #[case(0, "0-2")]
    #[case(3, "15-20")]
    #[case(4, "25-32")]
    #[case(7, "60-100")]
    fn test_bucket_mapping(#[case] index: usize, #[case] expected: &str) {
        assert_eq!(age_from_scores(&one_hot(index)).unwrap().to_string(), expected);
    }

    #[test]
    fn test_wrong_output_length() {
        assert!(matches!(
            age_from_scores(&[0.5, 0.5]),
            Err(ClassificationError::UnexpectedOutput {
                expected: 8,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_buckets_are_ordered_and_valid() {
        for pair in AGE_BUCKETS.windows(2) {
            assert!(pair[0].1 < pair[1].0);
        }
        for (low, high) in AGE_BUCKETS {
            assert!(AgeRange::new(low, high).is_some());
        }
    }
}
