//! Microsoft.Automation schedules

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "2015-10-31";

pub const FREQUENCIES: &[&str] = &["Day", "Hour", "Month", "OneTime", "Week"];

pub const WEEK_DAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCreateOrUpdateParameters {
    pub name: String,
    pub properties: ScheduleCreateOrUpdateProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCreateOrUpdateProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_schedule: Option<AdvancedSchedule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Option<ScheduleProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleProperties {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub expiry_time: Option<String>,
    /// Untyped in the API description, so it may come back as a float
    #[serde(default)]
    pub interval: Option<f64>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub advanced_schedule: Option<AdvancedSchedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSchedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_days: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month_days: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_occurrences: Option<Vec<MonthlyOccurrence>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyOccurrence {
    pub occurrence: i64,
    pub day: String,
}
