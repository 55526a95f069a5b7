//! Model-issued tool calls.
//!
//! The model may only invoke a fixed set of scheduling operations. Each call
//! is parsed from its `(name, arguments)` pair into a closed [`ToolCall`]
//! enum; anything that does not fit a variant's argument schema is rejected
//! before execution.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::error::ToolError;

pub const CREATE_SCHEDULE: &str = "createSchedule";
pub const QUERY_SCHEDULES: &str = "querySchedulesByDate";
pub const DELETE_SCHEDULE: &str = "deleteSchedule";
pub const DELETE_SCHEDULE_BY_INDEX: &str = "deleteScheduleByIndex";

/// Which tools are offered to the model for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSet {
    /// Full calendar assistant: create, query, delete, delete by index.
    Calendar,
    /// Stateless quick-schedule flow: create only, with extended fields.
    QuickSchedule,
}

impl ToolSet {
    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            ToolSet::Calendar => &[
                CREATE_SCHEDULE,
                QUERY_SCHEDULES,
                DELETE_SCHEDULE,
                DELETE_SCHEDULE_BY_INDEX,
            ],
            ToolSet::QuickSchedule => &[CREATE_SCHEDULE],
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.tool_names().contains(&name)
    }
}

impl fmt::Display for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSet::Calendar => write!(f, "calendar"),
            ToolSet::QuickSchedule => write!(f, "quick_schedule"),
        }
    }
}

/// Arguments of `createSchedule`.
///
/// Optional string fields treat `""`, `"null"` and `"none"` as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateScheduleArgs {
    /// Schedule title, required.
    pub title: Option<String>,
    /// Schedule date, required, format yyyy-MM-dd.
    pub date: Option<String>,
    /// Start time, format HH:mm such as 14:00; empty string when unknown.
    pub start_time: Option<String>,
    /// End time, format HH:mm; empty string when unknown.
    pub end_time: Option<String>,
    /// Location; empty string when unknown.
    pub location: Option<String>,
    /// True when the schedule has no specific time.
    pub is_all_day: Option<bool>,
}

/// Extended fields accepted by the quick-schedule `createSchedule` tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleExtras {
    /// Free-form notes; empty string when none.
    pub notes: Option<String>,
    /// Minutes before the start to remind; 0 for no reminder.
    pub reminder_minutes: Option<i64>,
    /// One of none, daily, weekly, monthly, yearly. Defaults to none.
    pub repeat_type: Option<String>,
    /// Hex color such as #FF5722; empty string for the default.
    pub color: Option<String>,
    /// Whether the schedule is marked important.
    pub is_important: Option<bool>,
    /// Category such as work, study, sport, health, life, social, family, travel, personal, other.
    pub category: Option<String>,
    /// Last date of a repeating schedule, format yyyy-MM-dd.
    pub repeat_end_date: Option<String>,
}

/// Full argument shape of the quick-schedule `createSchedule` tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuickCreateArgs {
    #[serde(flatten)]
    pub schedule: CreateScheduleArgs,
    #[serde(flatten)]
    pub extras: ScheduleExtras,
}

/// Arguments of `querySchedulesByDate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// Year, for example 2025.
    pub year: i32,
    /// Month from 1 to 12, for example 11 for November.
    pub month: i32,
}

/// Arguments of `deleteSchedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteArgs {
    /// Keyword contained in the title of the schedule to delete, such as gym or meeting.
    #[serde(alias = "keyword")]
    pub title_keyword: String,
}

/// Arguments of `deleteScheduleByIndex`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteByIndexArgs {
    /// The same title keyword used by the preceding deleteSchedule call.
    #[serde(alias = "keyword")]
    pub title_keyword: String,
    /// 1-based position in the list returned by deleteSchedule.
    pub index: i64,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CreateSchedule {
        args: CreateScheduleArgs,
        extras: ScheduleExtras,
    },
    QuerySchedules(QueryArgs),
    DeleteSchedule(DeleteArgs),
    DeleteScheduleByIndex(DeleteByIndexArgs),
}

impl ToolCall {
    /// Parse a model tool call for the given tool set.
    ///
    /// Unknown names, tools outside the set, and arguments that do not match
    /// the variant's schema all fail with [`ToolError::Validation`].
    pub fn parse(set: ToolSet, name: &str, input: serde_json::Value) -> Result<Self, ToolError> {
        if !set.allows(name) {
            return Err(ToolError::UnknownTool(name.to_string()));
        }

        let call = match name {
            CREATE_SCHEDULE if set == ToolSet::QuickSchedule => {
                let QuickCreateArgs { schedule, extras } = from_input(name, input)?;
                ToolCall::CreateSchedule {
                    args: schedule,
                    extras,
                }
            }
            CREATE_SCHEDULE => ToolCall::CreateSchedule {
                args: from_input(name, input)?,
                extras: ScheduleExtras::default(),
            },
            QUERY_SCHEDULES => ToolCall::QuerySchedules(from_input(name, input)?),
            DELETE_SCHEDULE => ToolCall::DeleteSchedule(from_input(name, input)?),
            DELETE_SCHEDULE_BY_INDEX => ToolCall::DeleteScheduleByIndex(from_input(name, input)?),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CreateSchedule { .. } => CREATE_SCHEDULE,
            ToolCall::QuerySchedules(_) => QUERY_SCHEDULES,
            ToolCall::DeleteSchedule(_) => DELETE_SCHEDULE,
            ToolCall::DeleteScheduleByIndex(_) => DELETE_SCHEDULE_BY_INDEX,
        }
    }
}

fn from_input<T: serde::de::DeserializeOwned>(
    name: &str,
    input: serde_json::Value,
) -> Result<T, ToolError> {
    // Some models send `null` instead of `{}` for argument-less calls.
    let input = if input.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        input
    };
    serde_json::from_value(input)
        .map_err(|e| ToolError::Validation(format!("invalid arguments for {name}: {e}")))
}

/// `true` for missing values and the placeholder strings models emit for
/// "no value": empty/whitespace, `null`, `none` (case-insensitive).
pub fn is_blank_or_null(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let v = v.trim();
            v.is_empty() || v.eq_ignore_ascii_case("null") || v.eq_ignore_ascii_case("none")
        }
    }
}

/// Normalise an optional model string: placeholders become `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    if is_blank_or_null(value) {
        None
    } else {
        value.map(|v| v.trim().to_string())
    }
}
