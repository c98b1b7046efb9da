//! SurrealDB implementation of [`TokenBlacklistRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::repository::TokenBlacklistRepository;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use super::support::{CountRow, write_error};
use crate::error::DbError;

/// SurrealDB implementation of the token blacklist.
#[derive(Clone)]
pub struct SurrealTokenBlacklistRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTokenBlacklistRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TokenBlacklistRepository for SurrealTokenBlacklistRepository<C> {
    async fn add(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> CprResult<()> {
        let outcome = self
            .db
            .query(
                "CREATE token_blacklist SET token_hash = $token_hash, \
                 user_id = $user_id, expires_at = $expires_at",
            )
            .bind(("token_hash", token_hash.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("expires_at", expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("blacklisted token", e));

        match outcome {
            Ok(_) | Err(DbError::Duplicate { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_blacklisted(&self, token_hash: &str) -> CprResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM token_blacklist \
                 WHERE token_hash = $token_hash GROUP ALL",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn cleanup_expired(&self) -> CprResult<u64> {
        let mut result = self
            .db
            .query("DELETE token_blacklist WHERE expires_at < time::now() RETURN BEFORE")
            .await
            .map_err(DbError::from)?;
        let removed: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        Ok(removed.len() as u64)
    }
}
