//! SurrealDB implementation of [`TimesheetRepository`].
//!
//! Approval creates the instructor's payment request in the same
//! transaction. `approved_without_payment_request` lists approved
//! timesheets that still lack one so they can be reconciled.

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::payment_request::{CreatePaymentRequest, PaymentRequest};
use cprhub_core::models::timesheet::{
    CreateTimesheet, Timesheet, TimesheetFilter, TimesheetStatus, UpdateTimesheet,
};
use cprhub_core::repository::{PaginatedResult, Pagination, TimesheetRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::payment_request;
use super::support::{
    CountRow, date_str, not_found, parse_date, parse_enum, parse_opt_uuid, parse_uuid, stale,
    write_error,
};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

#[derive(Debug, SurrealValue)]
struct TimesheetRow {
    record_id: String,
    instructor_id: String,
    week_start_date: String,
    hours: f64,
    courses_taught: u32,
    notes: Option<String>,
    status: String,
    review_comment: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TimesheetRow {
    fn try_into_timesheet(self) -> Result<Timesheet, DbError> {
        Ok(Timesheet {
            id: parse_uuid("timesheet", &self.record_id)?,
            instructor_id: parse_uuid("instructor", &self.instructor_id)?,
            week_start_date: parse_date("week_start_date", &self.week_start_date)?,
            hours: self.hours,
            courses_taught: self.courses_taught,
            notes: self.notes,
            status: parse_enum::<TimesheetStatus>("timesheet status", &self.status)?,
            review_comment: self.review_comment,
            reviewed_by: parse_opt_uuid("reviewed_by", self.reviewed_by)?,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct InstructorHoursRow {
    instructor_id: String,
    hours: f64,
}

/// SurrealDB implementation of the Timesheet repository.
#[derive(Clone)]
pub struct SurrealTimesheetRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTimesheetRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Timesheet, DbError> {
        let query = format!("{SELECT_FIELDS} FROM type::record('timesheet', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<TimesheetRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("timesheet", id))?
            .try_into_timesheet()
    }
}

impl<C: Connection> TimesheetRepository for SurrealTimesheetRepository<C> {
    async fn create(&self, input: CreateTimesheet) -> CprResult<Timesheet> {
        let id = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('timesheet', $id) SET \
                 instructor_id = $instructor_id, \
                 week_start_date = $week_start_date, \
                 hours = $hours, courses_taught = $courses_taught, \
                 notes = $notes, status = 'pending'",
            )
            .bind(("id", id.clone()))
            .bind(("instructor_id", input.instructor_id.to_string()))
            .bind(("week_start_date", date_str(input.week_start_date)))
            .bind(("hours", input.hours))
            .bind(("courses_taught", input.courses_taught))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("timesheet for week", e))?;

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<Timesheet> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn list(
        &self,
        filter: TimesheetFilter,
        pagination: Pagination,
    ) -> CprResult<PaginatedResult<Timesheet>> {
        let mut conditions = vec!["true"];
        if filter.instructor_id.is_some() {
            conditions.push("instructor_id = $instructor_id");
        }
        if filter.status.is_some() {
            conditions.push("status = $status");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM timesheet WHERE {where_clause} GROUP ALL; \
             {SELECT_FIELDS} FROM timesheet WHERE {where_clause} \
             ORDER BY week_start_date DESC \
             LIMIT $limit START $offset"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("instructor_id", filter.instructor_id.map(|id| id.to_string())))
            .bind(("status", filter.status.map(|s| s.as_str())))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<TimesheetRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_timesheet())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(
        &self,
        id: Uuid,
        from: TimesheetStatus,
        input: UpdateTimesheet,
    ) -> CprResult<Timesheet> {
        let id_str = id.to_string();

        // Any edit sends the timesheet back for review.
        let mut sets = vec![
            "status = 'pending'",
            "review_comment = NONE",
            "reviewed_by = NONE",
            "reviewed_at = NONE",
            "updated_at = time::now()",
        ];
        if input.hours.is_some() {
            sets.push("hours = $hours");
        }
        if input.courses_taught.is_some() {
            sets.push("courses_taught = $courses_taught");
        }
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }

        let query = format!(
            "UPDATE type::record('timesheet', $id) SET {} WHERE status = $from",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("from", from.as_str()));
        if let Some(hours) = input.hours {
            builder = builder.bind(("hours", hours));
        }
        if let Some(courses_taught) = input.courses_taught {
            builder = builder.bind(("courses_taught", courses_taught));
        }
        if let Some(notes) = input.notes {
            builder = builder.bind(("notes", notes));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(stale(&self.db, "timesheet", "timesheet", &id_str, from.as_str())
                .await
                .into());
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn approve(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
        payment: CreatePaymentRequest,
    ) -> CprResult<(Timesheet, PaymentRequest)> {
        let id_str = id.to_string();
        let request_id = Uuid::new_v4().to_string();

        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $timesheet = (UPDATE type::record('timesheet', $id) SET \
                     status = 'approved', review_comment = $comment, \
                     reviewed_by = $reviewer, reviewed_at = time::now(), \
                     updated_at = time::now() \
                     WHERE status = 'pending'); \
                 IF array::len($timesheet) = 0 { THROW 'timesheet changed concurrently' }; \
                 CREATE type::record('payment_request', $request_id) SET \
                     instructor_id = $instructor_id, timesheet_id = $id, \
                     amount_cents = $amount_cents, notes = $notes, \
                     status = 'pending'; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .bind(("comment", comment))
            .bind(("reviewer", reviewer.to_string()))
            .bind(("request_id", request_id.clone()))
            .bind(("instructor_id", payment.instructor_id.to_string()))
            .bind(("amount_cents", payment.amount_cents))
            .bind(("notes", payment.notes))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(timesheet_id = %id, error = %e, "Approval rolled back");
            let current = self.fetch(&id_str).await?;
            if current.status != TimesheetStatus::Pending {
                return Err(DbError::Conflict(format!(
                    "timesheet {id} is {}, expected pending",
                    current.status
                ))
                .into());
            }
            return Err(
                match payment_request::fetch_by(&self.db, payment_request::BY_TIMESHEET, id_str)
                    .await
                {
                    Ok(_) => DbError::Duplicate {
                        entity: "payment request for timesheet".into(),
                    },
                    Err(_) => DbError::Query(e.to_string()),
                }
                .into(),
            );
        }

        let timesheet = self.fetch(&id_str).await?;
        let request =
            payment_request::fetch_by(&self.db, payment_request::BY_ID, request_id).await?;
        Ok((timesheet, request))
    }

    async fn reject(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> CprResult<Timesheet> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(
                "UPDATE type::record('timesheet', $id) SET \
                 status = 'rejected', review_comment = $comment, \
                 reviewed_by = $reviewer, reviewed_at = time::now(), \
                 updated_at = time::now() \
                 WHERE status = 'pending'",
            )
            .bind(("id", id_str.clone()))
            .bind(("comment", comment))
            .bind(("reviewer", reviewer.to_string()))
            .await
            .map_err(DbError::from)?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(stale(&self.db, "timesheet", "timesheet", &id_str, "pending")
                .await
                .into());
        }
        Ok(self.fetch(&id_str).await?)
    }

    async fn approved_without_payment_request(&self) -> CprResult<Vec<Timesheet>> {
        let query = format!(
            "{SELECT_FIELDS} FROM timesheet WHERE status = 'approved' \
             AND meta::id(id) NOTINSIDE (SELECT VALUE timesheet_id FROM payment_request) \
             ORDER BY week_start_date ASC"
        );
        let mut result = self.db.query(&query).await.map_err(DbError::from)?;
        let rows: Vec<TimesheetRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_timesheet())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn approved_hours_by_instructor(&self) -> CprResult<Vec<(Uuid, f64)>> {
        let mut result = self
            .db
            .query(
                "SELECT instructor_id, math::sum(hours) AS hours FROM timesheet \
                 WHERE status = 'approved' GROUP BY instructor_id",
            )
            .await
            .map_err(DbError::from)?;
        let rows: Vec<InstructorHoursRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| Ok((parse_uuid("instructor", &row.instructor_id)?, row.hours)))
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
