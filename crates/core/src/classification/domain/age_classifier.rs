use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::constants::CHILD_MAX_MIDPOINT;
use crate::shared::error::ClassificationError;
use crate::shared::frame::Frame;

/// Estimated age as an inclusive range of years.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AgeRange {
    low: u32,
    high: u32,
}

impl AgeRange {
    /// Returns `None` when `low > high`.
    pub fn new(low: u32, high: u32) -> Option<Self> {
        (low <= high).then_some(Self { low, high })
    }

    pub fn low(&self) -> u32 {
        self.low
    }

    pub fn high(&self) -> u32 {
        self.high
    }

    /// Integer midpoint, rounded down. Exact for the whole `u32` range.
    pub fn midpoint(&self) -> u32 {
        self.low + (self.high - self.low) / 2
    }

    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::from_midpoint(i64::from(self.midpoint()))
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

impl FromStr for AgeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once('-')
            .ok_or_else(|| format!("age range {s:?} is not of the form low-high"))?;
        let low: u32 = low.trim().parse().map_err(|e| format!("bad low bound: {e}"))?;
        let high: u32 = high.trim().parse().map_err(|e| format!("bad high bound: {e}"))?;
        AgeRange::new(low, high).ok_or_else(|| format!("age range {s:?} has low > high"))
    }
}

/// Coarse age bucket handed to the event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    Child,
    Adult,
}

impl AgeGroup {
    pub fn from_midpoint(midpoint: i64) -> Self {
        if midpoint <= CHILD_MAX_MIDPOINT {
            AgeGroup::Child
        } else {
            AgeGroup::Adult
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeGroup::Child => write!(f, "Child"),
            AgeGroup::Adult => write!(f, "Adult"),
        }
    }
}

/// Domain interface for age estimation.
///
/// Implementations are stateless between calls and are shared across the
/// classification workers of one frame, hence `&self` and `Sync`.
pub trait AgeClassifier: Send + Sync {
    fn predict(&self, face: &Frame, context: &Frame) -> Result<AgeRange, ClassificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(i64::MIN, AgeGroup::Child)]
    #[case(0, AgeGroup::Child)]
    #[case(13, AgeGroup::Child)]
    #[case(14, AgeGroup::Child)]
    #[case(15, AgeGroup::Adult)]
    #[case(40, AgeGroup::Adult)]
    #[case(i64::MAX, AgeGroup::Adult)]
    fn test_age_group_boundary(#[case] midpoint: i64, #[case] expected: AgeGroup) {
        assert_eq!(AgeGroup::from_midpoint(midpoint), expected);
    }

    #[rstest]
    #[case(0, 2, 1, AgeGroup::Child)]
    #[case(8, 12, 10, AgeGroup::Child)]
    #[case(15, 20, 17, AgeGroup::Adult)]
    #[case(20, 29, 24, AgeGroup::Adult)]
    #[case(60, 100, 80, AgeGroup::Adult)]
    #[case(u32::MAX, u32::MAX, u32::MAX, AgeGroup::Adult)]
    #[case(u32::MAX - 1, u32::MAX, u32::MAX - 1, AgeGroup::Adult)]
    #[case(0, u32::MAX, u32::MAX / 2, AgeGroup::Adult)]
    fn test_range_midpoint_and_group(
        #[case] low: u32,
        #[case] high: u32,
        #[case] midpoint: u32,
        #[case] group: AgeGroup,
    ) {
        let range = AgeRange::new(low, high).unwrap();
        assert_eq!(range.midpoint(), midpoint);
        assert_eq!(range.age_group(), group);
    }

    #[test]
    fn test_bucketing_is_idempotent() {
        for midpoint in -50..150 {
            let group = AgeGroup::from_midpoint(midpoint);
            assert_eq!(AgeGroup::from_midpoint(midpoint), group);
        }
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(AgeRange::new(30, 20).is_none());
        assert!(AgeRange::new(20, 20).is_some());
    }

    #[test]
    fn test_display_and_parse() {
        let range = AgeRange::new(25, 32).unwrap();
        assert_eq!(range.to_string(), "25-32");
        assert_eq!("25-32".parse::<AgeRange>().unwrap(), range);
        assert!("32-25".parse::<AgeRange>().is_err());
        assert!("adult".parse::<AgeRange>().is_err());
    }

    #[test]
    fn test_age_group_serializes_as_name() {
        assert_eq!(serde_json::to_string(&AgeGroup::Child).unwrap(), "\"Child\"");
    }
}
