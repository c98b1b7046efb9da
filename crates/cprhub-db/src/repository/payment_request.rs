//! SurrealDB implementation of [`PaymentRequestRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::payment_request::{
    CreatePaymentRequest, PaymentRequest, PaymentRequestFilter, PaymentRequestStatus,
};
use cprhub_core::repository::{PaginatedResult, Pagination, PaymentRequestRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{
    CountRow, not_found, parse_enum, parse_opt_uuid, parse_uuid, stale, write_error,
};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

#[derive(Debug, SurrealValue)]
struct PaymentRequestRow {
    record_id: String,
    instructor_id: String,
    timesheet_id: String,
    amount_cents: i64,
    status: String,
    notes: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRequestRow {
    fn try_into_payment_request(self) -> Result<PaymentRequest, DbError> {
        Ok(PaymentRequest {
            id: parse_uuid("payment request", &self.record_id)?,
            instructor_id: parse_uuid("instructor", &self.instructor_id)?,
            timesheet_id: parse_uuid("timesheet", &self.timesheet_id)?,
            amount_cents: self.amount_cents,
            status: parse_enum::<PaymentRequestStatus>("payment request status", &self.status)?,
            notes: self.notes,
            reviewed_by: parse_opt_uuid("reviewed_by", self.reviewed_by)?,
            reviewed_at: self.reviewed_at,
            paid_at: self.paid_at,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(super) const BY_ID: &str = "type::record('payment_request', $value)";
pub(super) const BY_TIMESHEET: &str = "payment_request WHERE timesheet_id = $value";

/// Load one payment request from `source`, which refers to `$value`.
pub(super) async fn fetch_by<C: Connection>(
    db: &Surreal<C>,
    source: &str,
    value: String,
) -> Result<PaymentRequest, DbError> {
    let query = format!("{SELECT_FIELDS} FROM {source}");
    let mut result = db.query(&query).bind(("value", value.clone())).await?;
    let rows: Vec<PaymentRequestRow> = result.take(0)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| not_found("payment request", value))?
        .try_into_payment_request()
}

/// SurrealDB implementation of the PaymentRequest repository.
#[derive(Clone)]
pub struct SurrealPaymentRequestRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPaymentRequestRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn transition(
        &self,
        id: Uuid,
        sets: &str,
        from: PaymentRequestStatus,
        reviewer: Uuid,
        text: Option<String>,
    ) -> Result<PaymentRequest, DbError> {
        let id_str = id.to_string();
        let query = format!(
            "UPDATE type::record('payment_request', $id) SET {sets}, \
             reviewed_by = $reviewer, updated_at = time::now() \
             WHERE status = $from"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("from", from.as_str()))
            .bind(("reviewer", reviewer.to_string()))
            .bind(("text", text))
            .await?;
        let updated: Vec<surrealdb_types::Value> = result.take(0)?;
        if updated.is_empty() {
            return Err(stale(
                &self.db,
                "payment_request",
                "payment request",
                &id_str,
                from.as_str(),
            )
            .await);
        }
        fetch_by(&self.db, BY_ID, id_str).await
    }
}

impl<C: Connection> PaymentRequestRepository for SurrealPaymentRequestRepository<C> {
    async fn create(&self, input: CreatePaymentRequest) -> CprResult<PaymentRequest> {
        let id = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('payment_request', $id) SET \
                 instructor_id = $instructor_id, timesheet_id = $timesheet_id, \
                 amount_cents = $amount_cents, notes = $notes, \
                 status = 'pending'",
            )
            .bind(("id", id.clone()))
            .bind(("instructor_id", input.instructor_id.to_string()))
            .bind(("timesheet_id", input.timesheet_id.to_string()))
            .bind(("amount_cents", input.amount_cents))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("payment request for timesheet", e))?;

        Ok(fetch_by(&self.db, BY_ID, id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<PaymentRequest> {
        Ok(fetch_by(&self.db, BY_ID, id.to_string()).await?)
    }

    async fn get_by_timesheet(&self, timesheet_id: Uuid) -> CprResult<PaymentRequest> {
        Ok(fetch_by(&self.db, BY_TIMESHEET, timesheet_id.to_string()).await?)
    }

    async fn list(
        &self,
        filter: PaymentRequestFilter,
        pagination: Pagination,
    ) -> CprResult<PaginatedResult<PaymentRequest>> {
        let mut conditions = vec!["true"];
        if filter.instructor_id.is_some() {
            conditions.push("instructor_id = $instructor_id");
        }
        if filter.status.is_some() {
            conditions.push("status = $status");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM payment_request WHERE {where_clause} GROUP ALL; \
             {SELECT_FIELDS} FROM payment_request WHERE {where_clause} \
             ORDER BY created_at DESC \
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
        let rows: Vec<PaymentRequestRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_payment_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn approve(&self, id: Uuid, reviewer: Uuid) -> CprResult<PaymentRequest> {
        Ok(self
            .transition(
                id,
                "status = 'approved', reviewed_at = time::now()",
                PaymentRequestStatus::Pending,
                reviewer,
                None,
            )
            .await?)
    }

    async fn reject(
        &self,
        id: Uuid,
        from: PaymentRequestStatus,
        reviewer: Uuid,
        notes: Option<String>,
    ) -> CprResult<PaymentRequest> {
        let sets = if notes.is_some() {
            "status = 'rejected', reviewed_at = time::now(), notes = $text"
        } else {
            "status = 'rejected', reviewed_at = time::now()"
        };
        Ok(self.transition(id, sets, from, reviewer, notes).await?)
    }

    async fn pay(
        &self,
        id: Uuid,
        reviewer: Uuid,
        reference: Option<String>,
    ) -> CprResult<PaymentRequest> {
        Ok(self
            .transition(
                id,
                "status = 'paid', paid_at = time::now(), payment_reference = $text",
                PaymentRequestStatus::Approved,
                reviewer,
                reference,
            )
            .await?)
    }
}
