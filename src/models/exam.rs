use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{lenient, Entity};

/// A dated exam, independent of subjects.
///
/// `subject` is a display label and is not checked against subject ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exam {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient::date")]
    pub date: Option<NaiveDate>,
    /// Free-form time of day, e.g. `14:30` or `1:00 PM - 4:00 PM`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub time: Option<String>,
}

impl Exam {
    /// Local start instant. Falls back to midnight when the time is absent or
    /// cannot be read. `None` when the exam has no usable date.
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        let date = self.date?;
        let time = self
            .time
            .as_deref()
            .and_then(parse_time_of_day)
            .unwrap_or(NaiveTime::MIN);
        Some(date.and_time(time))
    }
}

impl Entity for Exam {
    const COLLECTION: &'static str = "exams";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Reads the start of a time-of-day string.
///
/// Accepts `HH:MM`, `H:MM AM/PM` and ranges such as `9:00 AM - 12:00 PM`,
/// where only the start counts.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let start = raw.split(['-', '–']).next()?.trim();
    if start.is_empty() {
        return None;
    }
    let upper = start.to_ascii_uppercase();
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&upper, fmt).ok())
}

/// Input for creating a new exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExamInput {
    pub subject: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn parses_24_hour_times() {
        assert_eq!(parse_time_of_day("08:00"), at(8, 0));
        assert_eq!(parse_time_of_day("23:15"), at(23, 15));
    }

    #[test]
    fn parses_12_hour_times_and_ranges() {
        assert_eq!(parse_time_of_day("1:00 PM"), at(13, 0));
        assert_eq!(parse_time_of_day("1:00 PM - 4:00 PM"), at(13, 0));
        assert_eq!(parse_time_of_day("9:00 am - 12:00 pm"), at(9, 0));
    }

    #[test]
    fn unparseable_time_starts_at_midnight() {
        let exam = Exam {
            id: "ex-1".to_string(),
            subject: "Maths".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 11),
            time: Some("after lunch".to_string()),
        };
        assert_eq!(
            exam.starts_at(),
            NaiveDate::from_ymd_opt(2024, 6, 11).map(|d| d.and_time(NaiveTime::MIN))
        );
    }

    #[test]
    fn exam_without_date_has_no_start() {
        let exam = Exam {
            id: "ex-1".to_string(),
            subject: "Maths".to_string(),
            date: None,
            time: Some("08:00".to_string()),
        };
        assert_eq!(exam.starts_at(), None);
    }
}
