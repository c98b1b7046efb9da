//! SurrealDB implementation of [`AvailabilityRepository`].

use chrono::{DateTime, NaiveDate, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::availability::InstructorAvailability;
use cprhub_core::repository::AvailabilityRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{CountRow, date_str, not_found, parse_date, parse_uuid, write_error};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AvailabilityRow {
    record_id: String,
    instructor_id: String,
    available_date: String,
    created_at: DateTime<Utc>,
}

impl AvailabilityRow {
    fn try_into_availability(self) -> Result<InstructorAvailability, DbError> {
        Ok(InstructorAvailability {
            id: parse_uuid("availability", &self.record_id)?,
            instructor_id: parse_uuid("instructor", &self.instructor_id)?,
            date: parse_date("available_date", &self.available_date)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of instructor availability.
#[derive(Clone)]
pub struct SurrealAvailabilityRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAvailabilityRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AvailabilityRepository for SurrealAvailabilityRepository<C> {
    async fn add(&self, instructor_id: Uuid, date: NaiveDate) -> CprResult<InstructorAvailability> {
        let id = Uuid::new_v4().to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('instructor_availability', $id) SET \
                 instructor_id = $instructor_id, available_date = $available_date; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('instructor_availability', $id)",
            )
            .bind(("id", id.clone()))
            .bind(("instructor_id", instructor_id.to_string()))
            .bind(("available_date", date_str(date)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("availability", e))?;

        let rows: Vec<AvailabilityRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found("availability", &id))?;
        Ok(row.try_into_availability()?)
    }

    async fn list_for_instructor(
        &self,
        instructor_id: Uuid,
        from: NaiveDate,
    ) -> CprResult<Vec<InstructorAvailability>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM instructor_availability \
                 WHERE instructor_id = $instructor_id AND available_date >= $from \
                 ORDER BY available_date ASC",
            )
            .bind(("instructor_id", instructor_id.to_string()))
            .bind(("from", date_str(from)))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<AvailabilityRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_availability())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn remove(&self, instructor_id: Uuid, date: NaiveDate) -> CprResult<()> {
        let day = date_str(date);
        let mut result = self
            .db
            .query(
                "DELETE instructor_availability \
                 WHERE instructor_id = $instructor_id AND available_date = $available_date \
                 RETURN BEFORE",
            )
            .bind(("instructor_id", instructor_id.to_string()))
            .bind(("available_date", day.clone()))
            .await
            .map_err(DbError::from)?;
        let removed: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(not_found("availability", format!("{instructor_id}@{day}")).into());
        }
        Ok(())
    }

    async fn is_available(&self, instructor_id: Uuid, date: NaiveDate) -> CprResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM instructor_availability \
                 WHERE instructor_id = $instructor_id AND available_date = $available_date \
                 GROUP ALL",
            )
            .bind(("instructor_id", instructor_id.to_string()))
            .bind(("available_date", date_str(date)))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn instructors_available_on(&self, date: NaiveDate) -> CprResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE instructor_id FROM instructor_availability \
                 WHERE available_date = $available_date",
            )
            .bind(("available_date", date_str(date)))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;

        Ok(ids
            .iter()
            .map(|raw| parse_uuid("instructor", raw))
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
