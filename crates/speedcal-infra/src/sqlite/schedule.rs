//! SQLite schedule repository implementation.
//!
//! Dates are stored as `yyyy-MM-dd` text and times as `HH:MM`, so range
//! filters and ordering work on plain string comparison.

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use speedcal_core::schedule::repository::ScheduleRepository;
use speedcal_types::error::RepositoryError;
use speedcal_types::schedule::{DATE_FORMAT, NewSchedule, RepeatType, Schedule, TIME_FORMAT, format_time};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `ScheduleRepository`.
pub struct SqliteScheduleRepository {
    pool: DatabasePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ScheduleRow {
    id: String,
    owner_id: String,
    group_id: Option<String>,
    title: String,
    schedule_date: String,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    is_all_day: i64,
    is_important: i64,
    color: String,
    category: String,
    is_ai_generated: i64,
    notes: Option<String>,
    reminder_minutes: Option<i64>,
    repeat_type: String,
    repeat_end_date: Option<String>,
    deleted: i64,
    created_at: String,
    updated_at: String,
}

impl ScheduleRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            group_id: row.try_get("group_id")?,
            title: row.try_get("title")?,
            schedule_date: row.try_get("schedule_date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            location: row.try_get("location")?,
            is_all_day: row.try_get("is_all_day")?,
            is_important: row.try_get("is_important")?,
            color: row.try_get("color")?,
            category: row.try_get("category")?,
            is_ai_generated: row.try_get("is_ai_generated")?,
            notes: row.try_get("notes")?,
            reminder_minutes: row.try_get("reminder_minutes")?,
            repeat_type: row.try_get("repeat_type")?,
            repeat_end_date: row.try_get("repeat_end_date")?,
            deleted: row.try_get("deleted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_schedule(self) -> Result<Schedule, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid schedule id: {e}")))?;
        let repeat_type: RepeatType = self.repeat_type.parse().map_err(RepositoryError::Query)?;

        Ok(Schedule {
            id,
            owner_id: self.owner_id,
            group_id: self.group_id,
            title: self.title,
            schedule_date: parse_date(&self.schedule_date)?,
            start_time: self.start_time.as_deref().map(parse_time).transpose()?,
            end_time: self.end_time.as_deref().map(parse_time).transpose()?,
            location: self.location,
            is_all_day: self.is_all_day != 0,
            is_important: self.is_important != 0,
            color: self.color,
            category: self.category,
            is_ai_generated: self.is_ai_generated != 0,
            notes: self.notes,
            reminder_minutes: self.reminder_minutes.and_then(|v| u32::try_from(v).ok()),
            repeat_type,
            repeat_end_date: self.repeat_end_date.as_deref().map(parse_date).transpose()?,
            deleted: self.deleted != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| RepositoryError::Query(format!("invalid date '{s}': {e}")))
}

fn parse_time(s: &str) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| RepositoryError::Query(format!("invalid time '{s}': {e}")))
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl ScheduleRepository for SqliteScheduleRepository {
    async fn create(&self, owner_id: &str, new: &NewSchedule) -> Result<Schedule, RepositoryError> {
        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            group_id: None,
            title: new.title.clone(),
            schedule_date: new.schedule_date,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location.clone(),
            is_all_day: new.is_all_day,
            is_important: new.is_important,
            color: new.color.clone(),
            category: new.category.clone(),
            is_ai_generated: new.is_ai_generated,
            notes: new.notes.clone(),
            reminder_minutes: new.reminder_minutes,
            repeat_type: new.repeat_type,
            repeat_end_date: new.repeat_end_date,
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO schedules (
                   id, owner_id, group_id, title, schedule_date, start_time, end_time, location,
                   is_all_day, is_important, color, category, is_ai_generated, notes,
                   reminder_minutes, repeat_type, repeat_end_date, deleted, created_at, updated_at)
               VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(schedule.id.to_string())
        .bind(owner_id)
        .bind(&schedule.title)
        .bind(format_date(&schedule.schedule_date))
        .bind(format_time(schedule.start_time))
        .bind(format_time(schedule.end_time))
        .bind(&schedule.location)
        .bind(i64::from(schedule.is_all_day))
        .bind(i64::from(schedule.is_important))
        .bind(&schedule.color)
        .bind(&schedule.category)
        .bind(i64::from(schedule.is_ai_generated))
        .bind(&schedule.notes)
        .bind(schedule.reminder_minutes.map(i64::from))
        .bind(schedule.repeat_type.to_string())
        .bind(schedule.repeat_end_date.as_ref().map(format_date))
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        tracing::debug!(schedule_id = %schedule.id, owner_id, "schedule created");
        Ok(schedule)
    }

    async fn list_by_range(
        &self,
        owner_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Schedule>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM schedules
               WHERE owner_id = ? AND deleted = 0 AND schedule_date >= ? AND schedule_date <= ?
               ORDER BY schedule_date ASC, start_time IS NOT NULL, start_time ASC, created_at ASC"#,
        )
        .bind(owner_id)
        .bind(format_date(&from))
        .bind(format_date(&to))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut schedules = Vec::with_capacity(rows.len());
        for row in &rows {
            let schedule_row = ScheduleRow::from_row(row).map_err(query_error)?;
            schedules.push(schedule_row.into_schedule()?);
        }
        Ok(schedules)
    }

    async fn get(&self, owner_id: &str, id: &Uuid) -> Result<Option<Schedule>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = ? AND owner_id = ? AND deleted = 0")
            .bind(id.to_string())
            .bind(owner_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let schedule_row = ScheduleRow::from_row(&row).map_err(query_error)?;
                Ok(Some(schedule_row.into_schedule()?))
            }
            None => Ok(None),
        }
    }

    async fn soft_delete(&self, owner_id: &str, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE schedules SET deleted = 1, updated_at = ? WHERE id = ? AND owner_id = ? AND deleted = 0",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(owner_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn timed(title: &str, day: &str, start: &str) -> NewSchedule {
        NewSchedule {
            start_time: Some(NaiveTime::parse_from_str(start, TIME_FORMAT).unwrap()),
            is_all_day: false,
            ..NewSchedule::new(title, date(day))
        }
    }

    #[tokio::test]
    async fn test_create_and_get_preserves_fields() {
        let repo = SqliteScheduleRepository::new(test_pool().await);
        let new = NewSchedule {
            end_time: Some(NaiveTime::parse_from_str("11:30", TIME_FORMAT).unwrap()),
            location: Some("Room 4".to_string()),
            is_important: true,
            category: "work".to_string(),
            is_ai_generated: true,
            reminder_minutes: Some(15),
            repeat_type: RepeatType::Weekly,
            repeat_end_date: Some(date("2025-12-31")),
            ..timed("Standup", "2025-06-02", "10:00")
        };

        let created = repo.create("alice", &new).await.unwrap();
        let fetched = repo.get("alice", &created.id).await.unwrap().unwrap();

        assert_eq!(fetched.title, "Standup");
        assert_eq!(fetched.schedule_date, date("2025-06-02"));
        assert_eq!(fetched.time_range_label(), created.time_range_label());
        assert_eq!(fetched.location.as_deref(), Some("Room 4"));
        assert!(fetched.is_important);
        assert!(!fetched.is_all_day);
        assert!(fetched.is_ai_generated);
        assert_eq!(fetched.reminder_minutes, Some(15));
        assert_eq!(fetched.repeat_type, RepeatType::Weekly);
        assert_eq!(fetched.repeat_end_date, Some(date("2025-12-31")));
    }

    #[tokio::test]
    async fn test_list_by_range_orders_untimed_first() {
        let repo = SqliteScheduleRepository::new(test_pool().await);
        repo.create("alice", &timed("Late", "2025-06-10", "18:00")).await.unwrap();
        repo.create("alice", &timed("Early", "2025-06-10", "08:00")).await.unwrap();
        repo.create("alice", &NewSchedule::new("Holiday", date("2025-06-10"))).await.unwrap();
        repo.create("alice", &NewSchedule::new("First", date("2025-06-01"))).await.unwrap();
        repo.create("alice", &NewSchedule::new("July", date("2025-07-01"))).await.unwrap();
        repo.create("bob", &NewSchedule::new("Other", date("2025-06-05"))).await.unwrap();

        let titles: Vec<String> = repo
            .list_by_range("alice", date("2025-06-01"), date("2025-06-30"))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["First", "Holiday", "Early", "Late"]);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_schedule() {
        let repo = SqliteScheduleRepository::new(test_pool().await);
        let created = repo
            .create("alice", &NewSchedule::new("Dentist", date("2025-06-03")))
            .await
            .unwrap();

        assert!(matches!(
            repo.soft_delete("bob", &created.id).await,
            Err(RepositoryError::NotFound)
        ));
        repo.soft_delete("alice", &created.id).await.unwrap();

        assert!(repo.get("alice", &created.id).await.unwrap().is_none());
        assert!(repo
            .list_by_range("alice", date("2025-06-01"), date("2025-06-30"))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            repo.soft_delete("alice", &created.id).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
