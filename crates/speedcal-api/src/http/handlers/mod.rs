//! HTTP request handlers for the REST API.

pub mod chat;
pub mod session;

use uuid::Uuid;

use crate::http::error::AppError;

/// Parse a session id from a path segment or request body, returning a 400
/// on invalid format.
pub(crate) fn parse_session_id(s: &str) -> Result<Uuid, AppError> {
    s.trim()
        .parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid session id: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_id() {
        let id = Uuid::now_v7();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_session_id("not-a-uuid"),
            Err(AppError::Validation(_))
        ));
    }
}
