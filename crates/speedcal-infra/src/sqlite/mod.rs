//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod api_key;
pub mod chat;
pub mod pool;
pub mod schedule;

use chrono::{DateTime, SecondsFormat, Utc};

use speedcal_types::error::RepositoryError;

/// Timestamps are stored as fixed-width RFC 3339 (microseconds, `Z`) so that
/// text ordering in SQL matches chronological ordering.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_format_sorts_chronologically() {
        let earlier = DateTime::parse_from_rfc3339("2025-06-01T09:00:00Z").unwrap().with_timezone(&Utc);
        let later = earlier + chrono::Duration::milliseconds(1500);
        let (a, b) = (format_datetime(&earlier), format_datetime(&later));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_datetime(&b).unwrap(), later);
    }
}
