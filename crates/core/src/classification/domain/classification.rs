use crate::classification::domain::age_classifier::{AgeGroup, AgeRange};
use crate::classification::domain::gender_classifier::Gender;

/// Age and gender estimate for one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub age: AgeRange,
    pub gender: Gender,
}

impl Classification {
    pub fn new(age: AgeRange, gender: Gender) -> Self {
        Self { age, gender }
    }

    /// Caption drawn next to the face box, e.g. `Male:[20-29]`.
    pub fn caption(&self) -> String {
        format!("{}:[{}-{}]", self.gender, self.age.low(), self.age.high())
    }

    pub fn age_group(&self) -> AgeGroup {
        self.age.age_group()
    }
}
