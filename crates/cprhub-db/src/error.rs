//! Database-specific error types and conversions.

use cprhub_core::error::CprError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {entity}")]
    Duplicate { entity: String },

    #[error("Stale update: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl From<DbError> for CprError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CprError::NotFound { entity, id },
            DbError::Duplicate { entity } => CprError::AlreadyExists { entity },
            DbError::Conflict(msg) => CprError::Conflict(msg),
            DbError::Hashing(msg) => CprError::Crypto(msg),
            other => CprError::Database(other.to_string()),
        }
    }
}
