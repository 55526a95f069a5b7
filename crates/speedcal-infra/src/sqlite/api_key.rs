//! API key store.
//!
//! Each key authenticates as exactly one user. Only the SHA-256 digest of a
//! key is persisted, so `resolve` hashes what the client presents and looks
//! the digest up.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use speedcal_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};
use crate::crypto::hash::{generate_api_key, sha256_hex};

/// Metadata about a stored key. The plain key is never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Returned once by `create`: the record plus the plain key to hand out.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub record: ApiKeyRecord,
    pub key: String,
}

pub struct SqliteApiKeyStore {
    pool: DatabasePool,
}

impl SqliteApiKeyStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Generate and store a key for `user_id`.
    pub async fn create(&self, user_id: &str, name: &str) -> Result<IssuedApiKey, RepositoryError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(RepositoryError::Query("user id must not be empty".to_string()));
        }

        let key = generate_api_key();
        let record = ApiKeyRecord {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
        };

        sqlx::query(
            "INSERT INTO api_keys (id, user_id, name, key_hash, created_at, last_used_at) VALUES (?, ?, ?, ?, ?, NULL)",
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(&record.name)
        .bind(sha256_hex(&key))
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict("api key collision".to_string());
                }
            }
            query_error(e)
        })?;

        tracing::info!(key_id = %record.id, user_id = %record.user_id, "api key created");
        Ok(IssuedApiKey { record, key })
    }

    /// Map a presented key to its user, recording the use.
    ///
    /// Returns `None` for unknown keys.
    pub async fn resolve(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let key_hash = sha256_hex(key.trim());
        let row = sqlx::query("SELECT id, user_id FROM api_keys WHERE key_hash = ?")
            .bind(&key_hash)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row.try_get("id").map_err(query_error)?;
        let user_id: String = row.try_get("user_id").map_err(query_error)?;

        // Best effort: a failed timestamp update must not reject the request.
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::warn!(key_id = %id, error = %e, "failed to record api key use");
        }

        Ok(Some(user_id))
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM api_keys WHERE user_id = ? ORDER BY created_at ASC")
            .bind(user_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(query_error)?;
            let created_at: String = row.try_get("created_at").map_err(query_error)?;
            let last_used_at: Option<String> = row.try_get("last_used_at").map_err(query_error)?;
            records.push(ApiKeyRecord {
                id: Uuid::parse_str(&id)
                    .map_err(|e| RepositoryError::Query(format!("invalid key id: {e}")))?,
                user_id: row.try_get("user_id").map_err(query_error)?,
                name: row.try_get("name").map_err(query_error)?,
                created_at: parse_datetime(&created_at)?,
                last_used_at: last_used_at.as_deref().map(parse_datetime).transpose()?,
            });
        }
        Ok(records)
    }

    pub async fn revoke(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(key_id = %id, "api key revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;

    #[tokio::test]
    async fn test_create_and_resolve() {
        let store = SqliteApiKeyStore::new(test_pool().await);

        let issued = store.create("alice", "laptop").await.unwrap();
        assert_eq!(store.resolve(&issued.key).await.unwrap().as_deref(), Some("alice"));
        assert!(store.resolve("sk-speedcal-unknown").await.unwrap().is_none());

        let records = store.list("alice").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "laptop");
        assert!(records[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_plain_key_is_not_stored() {
        let pool = test_pool().await;
        let store = SqliteApiKeyStore::new(pool.clone());
        let issued = store.create("alice", "cli").await.unwrap();

        let (stored,): (String,) = sqlx::query_as("SELECT key_hash FROM api_keys")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_ne!(stored, issued.key);
        assert_eq!(stored, sha256_hex(&issued.key));
    }

    #[tokio::test]
    async fn test_revoke_invalidates_key() {
        let store = SqliteApiKeyStore::new(test_pool().await);
        let issued = store.create("alice", "old").await.unwrap();

        store.revoke(&issued.record.id).await.unwrap();

        assert!(store.resolve(&issued.key).await.unwrap().is_none());
        assert!(matches!(
            store.revoke(&issued.record.id).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_blank_user_rejected() {
        let store = SqliteApiKeyStore::new(test_pool().await);
        assert!(store.create("  ", "x").await.is_err());
    }
}
