//! SurrealDB implementation of [`CourseRequestRepository`].
//!
//! Status changes are guarded by `WHERE status = ...` so that a racing
//! writer turns into a `Conflict` instead of a lost update.

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::course_request::{
    CourseRequest, CourseRequestFilter, CourseStatus, CreateCourseRequest,
};
use cprhub_core::models::invoice::StatusCount;
use cprhub_core::repository::{CourseRequestRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::support::{
    CountRow, date_str, not_found, parse_date, parse_enum, parse_opt_uuid, parse_uuid, stale,
    write_error,
};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

/// Gives the date back to the instructor a confirmed course is leaving.
/// Expects `$before` (the course as it was) and `$slot_id` to be set.
const RELEASE_SLOT: &str = "\
IF $before[0].status = 'confirmed' AND $before[0].instructor_id != NONE \
    AND array::len((SELECT VALUE id FROM instructor_availability \
        WHERE instructor_id = $before[0].instructor_id \
        AND available_date = $before[0].scheduled_date)) = 0 { \
    CREATE type::record('instructor_availability', $slot_id) SET \
        instructor_id = $before[0].instructor_id, \
        available_date = $before[0].scheduled_date \
};";

#[derive(Debug, SurrealValue)]
struct CourseRequestRow {
    record_id: String,
    organization_id: String,
    course_type_id: String,
    instructor_id: Option<String>,
    location: String,
    scheduled_date: String,
    expected_students: u32,
    notes: Option<String>,
    status: String,
    cancellation_reason: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    ready_for_billing_at: Option<DateTime<Utc>>,
    invoiced: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CourseRequestRow {
    fn try_into_course_request(self) -> Result<CourseRequest, DbError> {
        Ok(CourseRequest {
            id: parse_uuid("course request", &self.record_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            course_type_id: parse_uuid("course type", &self.course_type_id)?,
            instructor_id: parse_opt_uuid("instructor", self.instructor_id)?,
            location: self.location,
            scheduled_date: parse_date("scheduled_date", &self.scheduled_date)?,
            expected_students: self.expected_students,
            notes: self.notes,
            status: parse_enum::<CourseStatus>("course status", &self.status)?,
            cancellation_reason: self.cancellation_reason,
            confirmed_at: self.confirmed_at,
            completed_at: self.completed_at,
            ready_for_billing_at: self.ready_for_billing_at,
            invoiced: self.invoiced,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct StatusTotalRow {
    status: String,
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct InstructorTotalRow {
    instructor_id: Option<String>,
    total: u64,
}

/// SurrealDB implementation of the CourseRequest repository.
#[derive(Clone)]
pub struct SurrealCourseRequestRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCourseRequestRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<CourseRequest, DbError> {
        let query = format!("{SELECT_FIELDS} FROM type::record('course_request', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CourseRequestRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("course request", id))?
            .try_into_course_request()
    }

    /// Run a status-guarded update and return the fresh record.
    async fn transition(
        &self,
        id: Uuid,
        sets: &str,
        guard: &str,
        expected: &str,
        reason: Option<String>,
    ) -> Result<CourseRequest, DbError> {
        let id_str = id.to_string();
        let query = format!(
            "UPDATE type::record('course_request', $id) SET {sets}, \
             updated_at = time::now() WHERE {guard}"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("reason", reason))
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let updated: Vec<surrealdb_types::Value> = result.take(0)?;
        if updated.is_empty() {
            return Err(stale(&self.db, "course_request", "course request", &id_str, expected).await);
        }
        self.fetch(&id_str).await
    }
}

impl<C: Connection> CourseRequestRepository for SurrealCourseRequestRepository<C> {
    async fn create(&self, input: CreateCourseRequest) -> CprResult<CourseRequest> {
        let id = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('course_request', $id) SET \
                 organization_id = $organization_id, \
                 course_type_id = $course_type_id, \
                 location = $location, scheduled_date = $scheduled_date, \
                 expected_students = $expected_students, notes = $notes, \
                 status = 'pending', invoiced = false",
            )
            .bind(("id", id.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("course_type_id", input.course_type_id.to_string()))
            .bind(("location", input.location))
            .bind(("scheduled_date", date_str(input.scheduled_date)))
            .bind(("expected_students", input.expected_students))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("course request", e))?;

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<CourseRequest> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn list(
        &self,
        filter: CourseRequestFilter,
        pagination: Pagination,
    ) -> CprResult<PaginatedResult<CourseRequest>> {
        let mut conditions = vec!["true"];
        if filter.organization_id.is_some() {
            conditions.push("organization_id = $organization_id");
        }
        if filter.instructor_id.is_some() {
            conditions.push("instructor_id = $instructor_id");
        }
        if filter.status.is_some() {
            conditions.push("status = $status");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM course_request WHERE {where_clause} GROUP ALL; \
             {SELECT_FIELDS} FROM course_request WHERE {where_clause} \
             ORDER BY scheduled_date DESC, created_at DESC \
             LIMIT $limit START $offset"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(organization_id) = filter.organization_id {
            builder = builder.bind(("organization_id", organization_id.to_string()));
        }
        if let Some(instructor_id) = filter.instructor_id {
            builder = builder.bind(("instructor_id", instructor_id.to_string()));
        }
        if let Some(status) = filter.status {
            builder = builder.bind(("status", status.as_str()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<CourseRequestRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_course_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn confirm(
        &self,
        id: Uuid,
        from: CourseStatus,
        instructor_id: Uuid,
    ) -> CprResult<CourseRequest> {
        let id_str = id.to_string();
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $before = (UPDATE type::record('course_request', $id) SET \
                 status = 'confirmed', instructor_id = $instructor_id, \
                 confirmed_at = time::now(), updated_at = time::now() \
                 WHERE status = $from RETURN BEFORE); \
             IF array::len($before) = 0 {{ THROW 'course request changed concurrently' }}; \
             {RELEASE_SLOT} \
             LET $slot = (DELETE instructor_availability \
                 WHERE instructor_id = $instructor_id \
                 AND available_date = $before[0].scheduled_date RETURN BEFORE); \
             IF array::len($slot) = 0 {{ THROW 'instructor is not available' }}; \
             COMMIT TRANSACTION;"
        );

        let outcome = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("from", from.as_str()))
            .bind(("instructor_id", instructor_id.to_string()))
            .bind(("slot_id", Uuid::new_v4().to_string()))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(course_request_id = %id, error = %e, "Confirmation rolled back");
            let current = self.fetch(&id_str).await?;
            return Err(if current.status != from {
                DbError::Conflict(format!(
                    "course request {id} is {}, expected {from}",
                    current.status
                ))
            } else {
                DbError::Conflict(format!(
                    "instructor {instructor_id} is not available on {}",
                    current.scheduled_date
                ))
            }
            .into());
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn complete(&self, id: Uuid) -> CprResult<CourseRequest> {
        Ok(self
            .transition(
                id,
                "status = 'completed', completed_at = time::now()",
                "status = 'confirmed'",
                "confirmed",
                None,
            )
            .await?)
    }

    async fn cancel(
        &self,
        id: Uuid,
        from: CourseStatus,
        reason: Option<String>,
    ) -> CprResult<CourseRequest> {
        if from != CourseStatus::Confirmed {
            let guard = format!("status = '{from}'");
            return Ok(self
                .transition(
                    id,
                    "status = 'cancelled', cancellation_reason = $reason",
                    &guard,
                    from.as_str(),
                    reason,
                )
                .await?);
        }

        let id_str = id.to_string();
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $before = (UPDATE type::record('course_request', $id) SET \
                 status = 'cancelled', cancellation_reason = $reason, \
                 updated_at = time::now() \
                 WHERE status = 'confirmed' RETURN BEFORE); \
             IF array::len($before) = 0 {{ THROW 'course request changed concurrently' }}; \
             {RELEASE_SLOT} \
             COMMIT TRANSACTION;"
        );

        let outcome = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("reason", reason))
            .bind(("slot_id", Uuid::new_v4().to_string()))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(course_request_id = %id, error = %e, "Cancellation rolled back");
            return Err(
                stale(&self.db, "course_request", "course request", &id_str, "confirmed")
                    .await
                    .into(),
            );
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn mark_ready_for_billing(&self, id: Uuid) -> CprResult<CourseRequest> {
        Ok(self
            .transition(
                id,
                "ready_for_billing_at = time::now()",
                "status = 'completed' AND ready_for_billing_at = NONE",
                "completed and not yet released for billing",
                None,
            )
            .await?)
    }

    async fn billing_queue(&self) -> CprResult<Vec<CourseRequest>> {
        let query = format!(
            "{SELECT_FIELDS} FROM course_request \
             WHERE status = 'completed' AND ready_for_billing_at != NONE \
             AND invoiced = false \
             ORDER BY completed_at ASC"
        );
        let mut result = self.db.query(&query).await.map_err(DbError::from)?;
        let rows: Vec<CourseRequestRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_course_request())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn count_by_status(&self) -> CprResult<Vec<StatusCount>> {
        let mut result = self
            .db
            .query("SELECT status, count() AS total FROM course_request GROUP BY status")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<StatusTotalRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| StatusCount {
                status: r.status,
                count: r.total,
            })
            .collect())
    }

    async fn count_by_instructor(&self, status: CourseStatus) -> CprResult<Vec<(Uuid, u64)>> {
        let mut result = self
            .db
            .query(
                "SELECT instructor_id, count() AS total FROM course_request \
                 WHERE status = $status AND instructor_id != NONE \
                 GROUP BY instructor_id",
            )
            .bind(("status", status.as_str()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<InstructorTotalRow> = result.take(0).map_err(DbError::from)?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(raw) = row.instructor_id {
                counts.push((parse_uuid("instructor", &raw)?, row.total));
            }
        }
        Ok(counts)
    }
}
