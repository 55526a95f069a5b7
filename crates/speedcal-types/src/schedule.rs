//! Schedule records managed through the assistant's tools.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Color assigned when the caller does not pick one.
pub const DEFAULT_COLOR: &str = "#4AC4CF";

/// Category assigned when the caller does not pick one.
pub const DEFAULT_CATEGORY: &str = "other";

/// Wire format for schedule dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for schedule times.
pub const TIME_FORMAT: &str = "%H:%M";

/// How a schedule repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RepeatType {
    /// Human-readable label, `None` for non-repeating schedules.
    pub fn describe(&self) -> Option<&'static str> {
        match self {
            RepeatType::None => None,
            RepeatType::Daily => Some("repeats daily"),
            RepeatType::Weekly => Some("repeats weekly"),
            RepeatType::Monthly => Some("repeats monthly"),
            RepeatType::Yearly => Some("repeats yearly"),
        }
    }
}

impl fmt::Display for RepeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatType::None => write!(f, "none"),
            RepeatType::Daily => write!(f, "daily"),
            RepeatType::Weekly => write!(f, "weekly"),
            RepeatType::Monthly => write!(f, "monthly"),
            RepeatType::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for RepeatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RepeatType::None),
            "daily" => Ok(RepeatType::Daily),
            "weekly" => Ok(RepeatType::Weekly),
            "monthly" => Ok(RepeatType::Monthly),
            "yearly" => Ok(RepeatType::Yearly),
            other => Err(format!("invalid repeat type: '{other}'")),
        }
    }
}

/// A persisted schedule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub owner_id: String,
    pub group_id: Option<String>,
    pub title: String,
    pub schedule_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub is_all_day: bool,
    pub is_important: bool,
    pub color: String,
    pub category: String,
    pub is_ai_generated: bool,
    pub notes: Option<String>,
    pub reminder_minutes: Option<u32>,
    pub repeat_type: RepeatType,
    pub repeat_end_date: Option<NaiveDate>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// `14:00 - 15:00`, `all day`, or a range with `?` for missing ends.
    pub fn time_range_label(&self) -> String {
        if self.is_all_day {
            return "all day".to_string();
        }
        format!(
            "{} - {}",
            format_time(self.start_time).unwrap_or_else(|| "?".to_string()),
            format_time(self.end_time).unwrap_or_else(|| "?".to_string())
        )
    }

    /// Start time alone, or `all day`.
    pub fn start_label(&self) -> String {
        if self.is_all_day {
            return "all day".to_string();
        }
        format_time(self.start_time).unwrap_or_else(|| "?".to_string())
    }
}

/// Input for creating a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedule {
    pub title: String,
    pub schedule_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub is_all_day: bool,
    pub is_important: bool,
    pub color: String,
    pub category: String,
    pub is_ai_generated: bool,
    pub notes: Option<String>,
    pub reminder_minutes: Option<u32>,
    pub repeat_type: RepeatType,
    pub repeat_end_date: Option<NaiveDate>,
}

impl NewSchedule {
    /// A minimal schedule with every optional field at its default.
    pub fn new(title: impl Into<String>, schedule_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            schedule_date,
            start_time: None,
            end_time: None,
            location: None,
            is_all_day: true,
            is_important: false,
            color: DEFAULT_COLOR.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            is_ai_generated: false,
            notes: None,
            reminder_minutes: None,
            repeat_type: RepeatType::None,
            repeat_end_date: None,
        }
    }
}

pub fn format_time(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format(TIME_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(all_day: bool, start: Option<&str>, end: Option<&str>) -> Schedule {
        let parse = |s: &str| NaiveTime::parse_from_str(s, TIME_FORMAT).unwrap();
        Schedule {
            id: Uuid::now_v7(),
            owner_id: "u1".to_string(),
            group_id: None,
            title: "Gym".to_string(),
            schedule_date: NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            start_time: start.map(parse),
            end_time: end.map(parse),
            location: None,
            is_all_day: all_day,
            is_important: false,
            color: DEFAULT_COLOR.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            is_ai_generated: false,
            notes: None,
            reminder_minutes: None,
            repeat_type: RepeatType::None,
            repeat_end_date: None,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_repeat_type_roundtrip() {
        for rt in [
            RepeatType::None,
            RepeatType::Daily,
            RepeatType::Weekly,
            RepeatType::Monthly,
            RepeatType::Yearly,
        ] {
            let parsed: RepeatType = rt.to_string().parse().unwrap();
            assert_eq!(rt, parsed);
        }
        assert!("hourly".parse::<RepeatType>().is_err());
    }

    #[test]
    fn test_time_labels() {
        assert_eq!(schedule(true, None, None).time_range_label(), "all day");
        assert_eq!(
            schedule(false, Some("14:00"), None).time_range_label(),
            "14:00 - ?"
        );
        assert_eq!(
            schedule(false, Some("09:30"), Some("10:00")).start_label(),
            "09:30"
        );
    }

    #[test]
    fn test_new_schedule_defaults() {
        let s = NewSchedule::new("Dentist", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(s.color, DEFAULT_COLOR);
        assert_eq!(s.category, DEFAULT_CATEGORY);
        assert_eq!(s.repeat_type, RepeatType::None);
        assert!(s.is_all_day);
    }
}
