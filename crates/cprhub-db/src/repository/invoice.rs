//! SurrealDB implementation of [`InvoiceRepository`].
//!
//! Invoice creation and voiding touch the course request as well; both
//! run as a single transaction.

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::invoice::{CreateInvoice, Invoice, InvoiceFilter, InvoiceStatus};
use cprhub_core::repository::{InvoiceRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::support::{
    CountRow, current_status, date_str, not_found, parse_date, parse_enum, parse_uuid, stale,
    write_error,
};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

#[derive(Debug, SurrealValue)]
struct InvoiceRow {
    record_id: String,
    invoice_number: String,
    course_request_id: String,
    organization_id: String,
    student_count: u32,
    rate_per_student_cents: i64,
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    due_date: String,
    status: String,
    posted_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn try_into_invoice(self) -> Result<Invoice, DbError> {
        Ok(Invoice {
            id: parse_uuid("invoice", &self.record_id)?,
            invoice_number: self.invoice_number,
            course_request_id: parse_uuid("course request", &self.course_request_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            student_count: self.student_count,
            rate_per_student_cents: self.rate_per_student_cents,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            due_date: parse_date("due_date", &self.due_date)?,
            status: parse_enum::<InvoiceStatus>("invoice status", &self.status)?,
            posted_at: self.posted_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn filter_clause(filter: &InvoiceFilter) -> String {
    let mut conditions = vec!["true"];
    if filter.organization_id.is_some() {
        conditions.push("organization_id = $organization_id");
    }
    if !filter.statuses.is_empty() {
        conditions.push("status IN $statuses");
    }
    conditions.join(" AND ")
}

fn filter_binds(filter: &InvoiceFilter) -> (Option<String>, Vec<String>) {
    (
        filter.organization_id.map(|id| id.to_string()),
        filter.statuses.iter().map(|s| s.as_str().to_string()).collect(),
    )
}

/// SurrealDB implementation of the Invoice repository.
#[derive(Clone)]
pub struct SurrealInvoiceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInvoiceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Invoice, DbError> {
        let query = format!("{SELECT_FIELDS} FROM type::record('invoice', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<InvoiceRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("invoice", id))?
            .try_into_invoice()
    }

    async fn verified_payment_count(&self, id: &str) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM payment \
                 WHERE invoice_id = $id AND status = 'verified' GROUP ALL",
            )
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}

impl<C: Connection> InvoiceRepository for SurrealInvoiceRepository<C> {
    async fn create_for_course(&self, input: CreateInvoice) -> CprResult<Invoice> {
        let id = input.id.to_string();
        let course = input.course_request_id.to_string();

        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $course = (UPDATE type::record('course_request', $course_request_id) \
                     SET invoiced = true, updated_at = time::now() \
                     WHERE status = 'completed' AND ready_for_billing_at != NONE \
                     AND invoiced = false); \
                 IF array::len($course) = 0 { THROW 'course request is not awaiting billing' }; \
                 CREATE type::record('invoice', $id) SET \
                     invoice_number = $invoice_number, \
                     course_request_id = $course_request_id, \
                     organization_id = $organization_id, \
                     student_count = $student_count, \
                     rate_per_student_cents = $rate_per_student_cents, \
                     subtotal_cents = $subtotal_cents, tax_cents = $tax_cents, \
                     total_cents = $total_cents, due_date = $due_date, \
                     status = 'pending'; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.clone()))
            .bind(("invoice_number", input.invoice_number))
            .bind(("course_request_id", course.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("student_count", input.student_count))
            .bind(("rate_per_student_cents", input.rate_per_student_cents))
            .bind(("subtotal_cents", input.subtotal_cents))
            .bind(("tax_cents", input.tax_cents))
            .bind(("total_cents", input.total_cents))
            .bind(("due_date", date_str(input.due_date)))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(course_request_id = %course, error = %e, "Invoice creation rolled back");
            return Err(match current_status(&self.db, "course_request", &course).await? {
                None => not_found("course request", &course),
                Some(_) if e.to_string().contains("already contains") => {
                    write_error("invoice", e)
                }
                Some(_) => DbError::Conflict(format!(
                    "course request {course} is not awaiting billing"
                )),
            }
            .into());
        }

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<Invoice> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn list(
        &self,
        filter: InvoiceFilter,
        pagination: Pagination,
    ) -> CprResult<PaginatedResult<Invoice>> {
        let where_clause = filter_clause(&filter);
        let query = format!(
            "SELECT count() AS total FROM invoice WHERE {where_clause} GROUP ALL; \
             {SELECT_FIELDS} FROM invoice WHERE {where_clause} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );

        let (organization_id, statuses) = filter_binds(&filter);
        let mut result = self
            .db
            .query(&query)
            .bind(("organization_id", organization_id))
            .bind(("statuses", statuses))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<InvoiceRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_invoice())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_all(&self, filter: InvoiceFilter) -> CprResult<Vec<Invoice>> {
        let query = format!(
            "{SELECT_FIELDS} FROM invoice WHERE {} ORDER BY created_at DESC",
            filter_clause(&filter)
        );
        let (organization_id, statuses) = filter_binds(&filter);
        let mut result = self
            .db
            .query(&query)
            .bind(("organization_id", organization_id))
            .bind(("statuses", statuses))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<InvoiceRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_invoice())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn post(&self, id: Uuid) -> CprResult<Invoice> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(
                "UPDATE type::record('invoice', $id) SET status = 'posted', \
                 posted_at = time::now(), updated_at = time::now() \
                 WHERE status = 'pending'",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(stale(&self.db, "invoice", "invoice", &id_str, "pending")
                .await
                .into());
        }
        Ok(self.fetch(&id_str).await?)
    }

    async fn void(&self, id: Uuid, from: InvoiceStatus) -> CprResult<Invoice> {
        let id_str = id.to_string();

        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $verified = (SELECT VALUE meta::id(id) FROM payment \
                     WHERE invoice_id = $id AND status = 'verified'); \
                 IF array::len($verified) > 0 { THROW 'invoice has verified payments' }; \
                 LET $invoice = (UPDATE type::record('invoice', $id) SET \
                     status = 'void', updated_at = time::now() \
                     WHERE status = $from); \
                 IF array::len($invoice) = 0 { THROW 'invoice changed concurrently' }; \
                 UPDATE type::record('course_request', $invoice[0].course_request_id) \
                     SET invoiced = false, updated_at = time::now(); \
                 UPDATE payment SET status = 'rejected', reviewed_at = time::now(), \
                     notes = 'invoice voided' \
                     WHERE invoice_id = $id AND status = 'pending_verification'; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .bind(("from", from.as_str()))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(invoice_id = %id, error = %e, "Void rolled back");
            let current = self.fetch(&id_str).await?;
            return Err(if current.status != from {
                DbError::Conflict(format!("invoice {id} is {}, expected {from}", current.status))
            } else if self.verified_payment_count(&id_str).await? > 0 {
                DbError::Conflict(format!("invoice {id} has verified payments"))
            } else {
                DbError::Query(e.to_string())
            }
            .into());
        }

        Ok(self.fetch(&id_str).await?)
    }
}
