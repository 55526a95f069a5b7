//! ScheduleRepository trait definition.

use chrono::NaiveDate;
use speedcal_types::error::RepositoryError;
use speedcal_types::schedule::{NewSchedule, Schedule};
use uuid::Uuid;

/// Repository trait for calendar entries.
///
/// All reads exclude soft-deleted schedules and schedules of other owners.
pub trait ScheduleRepository: Send + Sync {
    fn create(
        &self,
        owner_id: &str,
        schedule: &NewSchedule,
    ) -> impl std::future::Future<Output = Result<Schedule, RepositoryError>> + Send;

    /// Schedules dated within `from..=to`, ordered by date then start time
    /// (untimed entries first within a day).
    fn list_by_range(
        &self,
        owner_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<Schedule>, RepositoryError>> + Send;

    fn get(
        &self,
        owner_id: &str,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Schedule>, RepositoryError>> + Send;

    /// Soft-delete a live schedule. `NotFound` if it is gone or not owned.
    fn soft_delete(
        &self,
        owner_id: &str,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
