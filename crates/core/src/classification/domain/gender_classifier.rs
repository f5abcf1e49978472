use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::error::ClassificationError;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

/// Domain interface for gender estimation. Same calling contract as
/// [`AgeClassifier`](crate::classification::domain::age_classifier::AgeClassifier).
pub trait GenderClassifier: Send + Sync {
    fn predict(&self, face: &Frame, context: &Frame) -> Result<Gender, ClassificationError>;
}
