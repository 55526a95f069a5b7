//! Tool execution.
//!
//! The dispatcher turns a validated [`ToolCall`] into schedule repository
//! operations on behalf of the caller bound to the turn's session key, and
//! renders the outcome as text for the model. It never talks to the client
//! directly; only the model's reply reaches the user.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use serde_json::Value;

use speedcal_types::error::{RepositoryError, ToolError};
use speedcal_types::schedule::{DATE_FORMAT, NewSchedule, RepeatType, Schedule, TIME_FORMAT};
use speedcal_types::tool::{
    CreateScheduleArgs, DeleteArgs, DeleteByIndexArgs, QueryArgs, ScheduleExtras, ToolCall,
    non_blank,
};

use super::disambiguation::{Candidate, DisambiguationStore};
use crate::context::registry::{ContextRegistry, TurnContext};
use crate::schedule::repository::ScheduleRepository;

pub struct ToolDispatcher<S> {
    schedules: Arc<S>,
    registry: ContextRegistry,
    pending: DisambiguationStore,
    today: fn() -> NaiveDate,
}

impl<S: ScheduleRepository> ToolDispatcher<S> {
    pub fn new(schedules: Arc<S>, registry: ContextRegistry) -> Self {
        Self {
            schedules,
            registry,
            pending: DisambiguationStore::new(),
            today: local_today,
        }
    }

    /// Override the clock used to pick the months a keyword delete searches.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn pending(&self) -> &DisambiguationStore {
        &self.pending
    }

    /// Parse and execute a raw model tool call. Every outcome, including
    /// rejected arguments and failures, becomes text the model can relay.
    pub async fn dispatch(&self, ctx: &TurnContext, name: &str, input: Value) -> String {
        let result = match ToolCall::parse(ctx.tool_set, name, input) {
            Ok(call) => self.execute(ctx, call).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    turn_id = %ctx.turn_id,
                    tool = name,
                    error = %e,
                    "tool call failed"
                );
                format!("Failed: {e}")
            }
        }
    }

    pub async fn execute(&self, ctx: &TurnContext, call: ToolCall) -> Result<String, ToolError> {
        let owner = self.caller(ctx)?;
        tracing::debug!(turn_id = %ctx.turn_id, tool = call.name(), "executing tool");

        match call {
            ToolCall::CreateSchedule { args, extras } => self.create(&owner, args, extras).await,
            ToolCall::QuerySchedules(args) => self.query(&owner, args).await,
            ToolCall::DeleteSchedule(args) => self.delete(ctx, &owner, args).await,
            ToolCall::DeleteScheduleByIndex(args) => self.delete_by_index(ctx, &owner, args).await,
        }
    }

    /// The caller bound to the turn's session. A missing or mismatched
    /// binding means the turn is not entitled to act for anyone.
    fn caller(&self, ctx: &TurnContext) -> Result<String, ToolError> {
        match self.registry.resolve(&ctx.session_key) {
            Some(bound) if bound == ctx.caller_id => Ok(bound),
            Some(_) => {
                tracing::warn!(
                    turn_id = %ctx.turn_id,
                    session = %ctx.session_key,
                    "session bound to a different caller"
                );
                Err(ToolError::MissingCaller)
            }
            None => Err(ToolError::MissingCaller),
        }
    }

    async fn create(
        &self,
        owner: &str,
        args: CreateScheduleArgs,
        extras: ScheduleExtras,
    ) -> Result<String, ToolError> {
        let title = non_blank(args.title.as_deref())
            .ok_or_else(|| ToolError::Validation("a schedule title is required".to_string()))?;
        let date = non_blank(args.date.as_deref()).ok_or_else(|| {
            ToolError::Validation("a date is required, use yyyy-MM-dd such as 2025-11-26".to_string())
        })?;

        let mut new = NewSchedule::new(title, parse_date(&date)?);
        new.start_time = parse_time(args.start_time.as_deref(), "start time")?;
        new.end_time = parse_time(args.end_time.as_deref(), "end time")?;
        new.location = non_blank(args.location.as_deref());
        new.is_all_day = args
            .is_all_day
            .unwrap_or(new.start_time.is_none() && new.end_time.is_none());
        new.is_ai_generated = true;
        apply_extras(&mut new, extras)?;

        let schedule = self.schedules.create(owner, &new).await?;
        tracing::info!(owner, schedule_id = %schedule.id, "schedule created");
        Ok(creation_summary(&schedule))
    }

    async fn query(&self, owner: &str, args: QueryArgs) -> Result<String, ToolError> {
        let month = u32::try_from(args.month)
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| ToolError::Validation("month must be between 1 and 12".to_string()))?;
        let (from, to) = month_bounds(args.year, month)
            .ok_or_else(|| ToolError::Validation(format!("year {} is out of range", args.year)))?;

        let schedules = self.schedules.list_by_range(owner, from, to).await?;
        let heading = format!("{}-{month:02}", args.year);
        if schedules.is_empty() {
            return Ok(format!("No schedules in {heading}."));
        }

        let mut out = format!("{heading} has {} schedule(s):\n", schedules.len());
        for (i, s) in schedules.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. [{}] {} {}",
                i + 1,
                s.schedule_date.format(DATE_FORMAT),
                s.title,
                s.time_range_label()
            ));
            if let Some(location) = &s.location {
                out.push_str(&format!(" @ {location}"));
            }
        }
        Ok(out)
    }

    async fn delete(&self, ctx: &TurnContext, owner: &str, args: DeleteArgs) -> Result<String, ToolError> {
        let keyword = require_keyword(&args.title_keyword)?;
        let today = (self.today)();

        let (year, month) = (today.year(), today.month());
        let mut pool = self.month(owner, year, month).await?;
        if pool.is_empty() {
            let (year, month) = next_month(year, month);
            pool = self.month(owner, year, month).await?;
        }
        let matches = filter_by_keyword(pool, &keyword);

        match matches.as_slice() {
            [] => Ok(not_found(&keyword)),
            [only] => {
                self.schedules.soft_delete(owner, &only.id).await?;
                self.pending.clear(&ctx.session_key, &keyword);
                tracing::info!(owner, schedule_id = %only.id, "schedule deleted");
                Ok(format!("Deleted schedule: {}", candidate_label(only)))
            }
            many => {
                let candidates: Vec<Candidate> = many.iter().map(candidate).collect();
                let listing = numbered(&candidates);
                self.pending.record(&ctx.session_key, &keyword, candidates);
                Ok(format!(
                    "Found {} schedules containing \"{keyword}\":\n\n{listing}\n\n\
                     Ask the user which one to delete, for example \"delete number 1\".",
                    many.len()
                ))
            }
        }
    }

    async fn delete_by_index(
        &self,
        ctx: &TurnContext,
        owner: &str,
        args: DeleteByIndexArgs,
    ) -> Result<String, ToolError> {
        let keyword = require_keyword(&args.title_keyword)?;

        let candidates: Vec<Candidate> = match self.pending.get(&ctx.session_key, &keyword) {
            Some(listed) => listed.as_ref().clone(),
            None => {
                // No list was shown in this session. Matches across the
                // current and next month together are numbered in date order.
                let today = (self.today)();
                let (from, _) = month_bounds(today.year(), today.month())
                    .ok_or_else(|| ToolError::Validation("current date out of range".to_string()))?;
                let (next_year, next) = next_month(today.year(), today.month());
                let (_, to) = month_bounds(next_year, next)
                    .ok_or_else(|| ToolError::Validation("current date out of range".to_string()))?;
                let pool = self.schedules.list_by_range(owner, from, to).await?;
                filter_by_keyword(pool, &keyword).iter().map(candidate).collect()
            }
        };

        if candidates.is_empty() {
            return Ok(not_found(&keyword));
        }

        let chosen = usize::try_from(args.index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| candidates.get(i))
            .ok_or(ToolError::OutOfRange {
                index: args.index,
                count: candidates.len(),
            })?;

        match self.schedules.soft_delete(owner, &chosen.schedule_id).await {
            Ok(()) => {
                self.pending.clear(&ctx.session_key, &keyword);
                tracing::info!(owner, schedule_id = %chosen.schedule_id, "schedule deleted");
                Ok(format!("Deleted schedule: {}", chosen.label))
            }
            Err(RepositoryError::NotFound) => {
                self.pending.clear(&ctx.session_key, &keyword);
                Ok(format!(
                    "{} no longer exists. Search again before deleting.",
                    chosen.label
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn month(&self, owner: &str, year: i32, month: u32) -> Result<Vec<Schedule>, ToolError> {
        let (from, to) = month_bounds(year, month)
            .ok_or_else(|| ToolError::Validation(format!("{year}-{month:02} is out of range")))?;
        Ok(self.schedules.list_by_range(owner, from, to).await?)
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next) = next_month(year, month);
    let last = NaiveDate::from_ymd_opt(next_year, next, 1)?.pred_opt()?;
    Some((first, last))
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ToolError::Validation(format!(
            "invalid date '{value}', use yyyy-MM-dd such as 2025-11-26"
        ))
    })
}

fn parse_time(value: Option<&str>, field: &str) -> Result<Option<NaiveTime>, ToolError> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };
    NaiveTime::parse_from_str(&value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"))
        .map(Some)
        .map_err(|_| ToolError::Validation(format!("invalid {field} '{value}', use HH:mm such as 14:00")))
}

fn apply_extras(new: &mut NewSchedule, extras: ScheduleExtras) -> Result<(), ToolError> {
    new.notes = non_blank(extras.notes.as_deref());
    new.reminder_minutes = extras
        .reminder_minutes
        .filter(|m| *m > 0)
        .map(|m| u32::try_from(m).unwrap_or(u32::MAX));
    if let Some(repeat) = non_blank(extras.repeat_type.as_deref()) {
        new.repeat_type = repeat.parse::<RepeatType>().map_err(ToolError::Validation)?;
    }
    if let Some(color) = non_blank(extras.color.as_deref()) {
        new.color = color;
    }
    if let Some(category) = non_blank(extras.category.as_deref()) {
        new.category = category.to_lowercase();
    }
    new.is_important = extras.is_important.unwrap_or(false);
    new.repeat_end_date = match non_blank(extras.repeat_end_date.as_deref()) {
        Some(date) => Some(parse_date(&date)?),
        None => None,
    };
    Ok(())
}

fn require_keyword(raw: &str) -> Result<String, ToolError> {
    non_blank(Some(raw)).ok_or_else(|| {
        ToolError::Validation(
            "a title keyword is required, for example \"gym\" or \"meeting\"".to_string(),
        )
    })
}

/// Case-sensitive substring match on the title.
fn filter_by_keyword(schedules: Vec<Schedule>, keyword: &str) -> Vec<Schedule> {
    schedules
        .into_iter()
        .filter(|s| s.title.contains(keyword))
        .collect()
}

fn candidate(schedule: &Schedule) -> Candidate {
    Candidate {
        schedule_id: schedule.id,
        label: candidate_label(schedule),
    }
}

fn candidate_label(schedule: &Schedule) -> String {
    format!(
        "[{}] {} {}",
        schedule.schedule_date.format(DATE_FORMAT),
        schedule.title,
        schedule.start_label()
    )
}

fn numbered(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.label))
        .collect::<Vec<_>>()
        .join("\n")
}

fn not_found(keyword: &str) -> String {
    format!("No schedule with a title containing \"{keyword}\" was found.")
}

fn creation_summary(schedule: &Schedule) -> String {
    let mut out = format!(
        "Schedule created.\nTitle: {}\nDate: {}\nTime: {}",
        schedule.title,
        schedule.schedule_date.format(DATE_FORMAT),
        schedule.time_range_label()
    );
    if let Some(location) = &schedule.location {
        out.push_str(&format!("\nLocation: {location}"));
    }
    if let Some(minutes) = schedule.reminder_minutes {
        out.push_str(&format!("\nReminder: {minutes} minutes before"));
    }
    if let Some(repeat) = schedule.repeat_type.describe() {
        out.push_str(&format!("\nRepeat: {repeat}"));
    }
    out
}
