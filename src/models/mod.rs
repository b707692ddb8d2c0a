use chrono::{Datelike, Days, NaiveDate, SecondsFormat, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TARGET_UNIT: &str = "hours";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid date format for {field}: {value}. Use YYYY-MM-DD (example: 2025-01-06)")]
    InvalidDate { field: &'static str, value: String },
    #[error("{field} must be a Monday: {value}")]
    NotMonday { field: &'static str, value: String },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} is outside the supported date range: {value}")]
    WeekOutOfRange { field: &'static str, value: String },
    #[error("{field} must not be empty")]
    EmptyList { field: &'static str },
    #[error("{field} lists {value} more than once")]
    DuplicateId { field: &'static str, value: String },
    #[error("{field} must be a finite, non-negative number")]
    OutOfRange { field: &'static str },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("Unknown activity_type: {0}. Expected one of: time, count")]
    UnknownActivityType(String),
    #[error("Invalid payload: {0}")]
    Payload(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    #[default]
    Time,
    Count,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "time" => Ok(Self::Time),
            "count" => Ok(Self::Count),
            other => Err(ValidationError::UnknownActivityType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub activity_type: ActivityType,
    pub target_unit: String,
    #[serde(default)]
    pub display_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub id: String,
    pub activity_id: String,
    pub entry_date: String,
    pub value_amount: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyGoal {
    pub id: String,
    pub activity_id: String,
    pub week_start_date: String,
    pub target_value: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReflection {
    pub id: String,
    pub activity_id: String,
    pub week_start_date: String,
    pub reflection_text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityGoal {
    pub id: String,
    pub activity_id: String,
    pub week_start_date: String,
    pub goal_text: String,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub display_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: String,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default = "default_target_unit")]
    pub target_unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDailyEntry {
    pub activity_id: String,
    pub entry_date: String,
    pub value_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeeklyGoal {
    pub activity_id: String,
    pub week_start_date: String,
    pub target_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeeklyReflection {
    pub activity_id: String,
    pub week_start_date: String,
    #[serde(default)]
    pub reflection_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivityGoal {
    pub activity_id: String,
    pub week_start_date: String,
    pub goal_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalCompletion {
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityOrder {
    pub activity_ids: Vec<String>,
}

impl NewActivity {
    pub fn new(name: &str, activity_type: ActivityType) -> Self {
        Self {
            name: name.to_string(),
            is_active: true,
            activity_type,
            target_unit: default_target_unit(),
        }
    }

    pub fn validated(self) -> Result<Self, ValidationError> {
        let name = required_text("name", &self.name)?;
        let target_unit = required_text("target_unit", &self.target_unit)?;

        Ok(Self {
            name,
            target_unit,
            ..self
        })
    }
}

impl NewDailyEntry {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let activity_id = required_text("activity_id", &self.activity_id)?;
        let entry_date = format_date(parse_date("entry_date", &self.entry_date)?);
        let value_amount = non_negative("value_amount", self.value_amount)?;

        Ok(Self {
            activity_id,
            entry_date,
            value_amount,
        })
    }
}

impl NewWeeklyGoal {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let activity_id = required_text("activity_id", &self.activity_id)?;
        let week_start_date =
            format_date(parse_week_start("week_start_date", &self.week_start_date)?);
        let target_value = finite("target_value", self.target_value)?;

        Ok(Self {
            activity_id,
            week_start_date,
            target_value,
        })
    }
}

impl NewWeeklyReflection {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let activity_id = required_text("activity_id", &self.activity_id)?;
        let week_start_date =
            format_date(parse_week_start("week_start_date", &self.week_start_date)?);

        Ok(Self {
            activity_id,
            week_start_date,
            reflection_text: self.reflection_text,
        })
    }
}

impl NewActivityGoal {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let activity_id = required_text("activity_id", &self.activity_id)?;
        let week_start_date =
            format_date(parse_week_start("week_start_date", &self.week_start_date)?);
        let goal_text = required_text("goal_text", &self.goal_text)?;
        if self.display_order.is_some_and(|order| order < 0) {
            return Err(ValidationError::OutOfRange {
                field: "display_order",
            });
        }

        Ok(Self {
            activity_id,
            week_start_date,
            goal_text,
            display_order: self.display_order,
        })
    }
}

impl ActivityOrder {
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.activity_ids.is_empty() {
            return Err(ValidationError::EmptyList {
                field: "activity_ids",
            });
        }

        let mut activity_ids: Vec<String> = Vec::with_capacity(self.activity_ids.len());
        for id in &self.activity_ids {
            let id = required_text("activity_ids", id)?;
            if activity_ids.contains(&id) {
                return Err(ValidationError::DuplicateId {
                    field: "activity_ids",
                    value: id,
                });
            }
            activity_ids.push(id);
        }

        Ok(Self { activity_ids })
    }
}

pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

pub fn parse_week_start(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let date = parse_date(field, value)?;
    if date.weekday() != Weekday::Mon {
        return Err(ValidationError::NotMonday {
            field,
            value: value.to_string(),
        });
    }
    if date.checked_add_days(Days::new(6)).is_none() {
        return Err(ValidationError::WeekOutOfRange {
            field,
            value: value.to_string(),
        });
    }

    Ok(date)
}

pub fn previous_week_start(
    field: &'static str,
    monday: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    monday
        .checked_sub_days(Days::new(7))
        .ok_or_else(|| ValidationError::WeekOutOfRange {
            field,
            value: format_date(monday),
        })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    Ok(trimmed.to_string())
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange { field })
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

fn default_is_active() -> bool {
    true
}

fn default_target_unit() -> String {
    DEFAULT_TARGET_UNIT.to_string()
}
