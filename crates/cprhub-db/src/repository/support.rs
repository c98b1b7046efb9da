//! Helpers shared by the repository implementations.

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

#[derive(Debug, SurrealValue)]
struct StatusRow {
    status: String,
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(field: &str, raw: Option<String>) -> Result<Option<Uuid>, DbError> {
    raw.map(|r| parse_uuid(field, &r)).transpose()
}

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DbError::Corrupt(format!("invalid {field} date '{raw}': {e}")))
}

pub(crate) fn parse_enum<T>(field: &str, raw: &str) -> Result<T, DbError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| DbError::Corrupt(format!("{field}: {e}")))
}

pub(crate) fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn opt_uuid_str(id: Option<Uuid>) -> Option<String> {
    id.map(|u| u.to_string())
}

pub(crate) fn not_found(entity: &str, id: impl Display) -> DbError {
    DbError::NotFound {
        entity: entity.into(),
        id: id.to_string(),
    }
}

/// Map a failed write. Unique index violations become `Duplicate`.
pub(crate) fn write_error(entity: &str, err: impl Display) -> DbError {
    let msg = err.to_string();
    if msg.contains("already contains") {
        DbError::Duplicate {
            entity: entity.into(),
        }
    } else {
        DbError::Query(msg)
    }
}

/// Current `status` of a record, or `None` when it does not exist.
pub(crate) async fn current_status<C: Connection>(
    db: &Surreal<C>,
    table: &'static str,
    id: &str,
) -> Result<Option<String>, DbError> {
    let mut result = db
        .query("SELECT status FROM type::record($table, $id)")
        .bind(("table", table))
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<StatusRow> = result.take(0)?;
    Ok(rows.into_iter().next().map(|r| r.status))
}

/// Explain why a status-guarded update matched nothing.
pub(crate) async fn stale<C: Connection>(
    db: &Surreal<C>,
    table: &'static str,
    entity: &str,
    id: &str,
    expected: &str,
) -> DbError {
    match current_status(db, table, id).await {
        Ok(None) => not_found(entity, id),
        Ok(Some(status)) => {
            DbError::Conflict(format!("{entity} {id} is {status}, expected {expected}"))
        }
        Err(e) => e,
    }
}
