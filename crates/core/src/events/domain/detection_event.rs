use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::classification::domain::age_classifier::AgeGroup;
use crate::classification::domain::classification::Classification;
use crate::classification::domain::gender_classifier::Gender;
use crate::shared::constants::EVENT_TIME_FORMAT;

/// One classified face, as handed to the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub gender: Gender,
    pub age_group: AgeGroup,
    pub image_path: Option<PathBuf>,
    /// Capture time, `YYYY-MM-DD HH:MM:SS` local.
    pub time: String,
    /// Raw age range, `low-high`.
    pub estimation: String,
}

impl DetectionEvent {
    pub fn new(
        classification: &Classification,
        captured_at: DateTime<Local>,
        image_path: Option<PathBuf>,
    ) -> Self {
        Self {
            gender: classification.gender,
            age_group: classification.age_group(),
            image_path,
            time: captured_at.format(EVENT_TIME_FORMAT).to_string(),
            estimation: classification.age.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::age_classifier::AgeRange;
    use chrono::TimeZone;

    #[test]
    fn test_fields_from_classification() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let c = Classification::new(AgeRange::new(8, 12).unwrap(), Gender::Female);
        let event = DetectionEvent::new(&c, at, Some(PathBuf::from("snap.jpg")));
        assert_eq!(event.gender, Gender::Female);
        assert_eq!(event.age_group, AgeGroup::Child);
        assert_eq!(event.time, "2024-03-09 07:05:01");
        assert_eq!(event.estimation, "8-12");
        assert_eq!(event.image_path, Some(PathBuf::from("snap.jpg")));
    }

    #[test]
    fn test_serializes_five_fields() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let c = Classification::new(AgeRange::new(25, 32).unwrap(), Gender::Male);
        let value = serde_json::to_value(DetectionEvent::new(&c, at, None)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "gender": "Male",
                "age_group": "Adult",
                "image_path": null,
                "time": "2024-03-09 07:05:01",
                "estimation": "25-32"
            })
        );
    }
}
