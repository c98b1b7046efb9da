//! SurrealDB implementation of [`VendorInvoiceRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::vendor_invoice::{
    CreateVendorInvoice, UpdateVendorInvoice, VendorInvoice, VendorInvoiceFilter,
    VendorInvoiceStatus,
};
use cprhub_core::repository::{PaginatedResult, Pagination, VendorInvoiceRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{
    CountRow, date_str, not_found, parse_date, parse_enum, parse_uuid, stale, write_error,
};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

#[derive(Debug, SurrealValue)]
struct VendorInvoiceRow {
    record_id: String,
    vendor_id: String,
    invoice_number: String,
    description: String,
    amount_cents: i64,
    invoice_date: String,
    due_date: String,
    status: String,
    rejection_reason: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VendorInvoiceRow {
    fn try_into_vendor_invoice(self) -> Result<VendorInvoice, DbError> {
        Ok(VendorInvoice {
            id: parse_uuid("vendor invoice", &self.record_id)?,
            vendor_id: parse_uuid("vendor", &self.vendor_id)?,
            invoice_number: self.invoice_number,
            description: self.description,
            amount_cents: self.amount_cents,
            invoice_date: parse_date("invoice_date", &self.invoice_date)?,
            due_date: parse_date("due_date", &self.due_date)?,
            status: parse_enum::<VendorInvoiceStatus>("vendor invoice status", &self.status)?,
            rejection_reason: self.rejection_reason,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
            paid_at: self.paid_at,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the VendorInvoice repository.
#[derive(Clone)]
pub struct SurrealVendorInvoiceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealVendorInvoiceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<VendorInvoice, DbError> {
        let query = format!("{SELECT_FIELDS} FROM type::record('vendor_invoice', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<VendorInvoiceRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("vendor invoice", id))?
            .try_into_vendor_invoice()
    }

    /// Status-guarded update. `$from`, `$reason` and `$reference` are
    /// always bound.
    async fn transition(
        &self,
        id: Uuid,
        sets: &str,
        from: VendorInvoiceStatus,
        reason: Option<String>,
        reference: Option<String>,
    ) -> Result<VendorInvoice, DbError> {
        let id_str = id.to_string();
        let query = format!(
            "UPDATE type::record('vendor_invoice', $id) SET {sets}, \
             updated_at = time::now() WHERE status = $from"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("from", from.as_str()))
            .bind(("reason", reason))
            .bind(("reference", reference))
            .await?;
        let updated: Vec<surrealdb_types::Value> = result.take(0)?;
        if updated.is_empty() {
            return Err(stale(
                &self.db,
                "vendor_invoice",
                "vendor invoice",
                &id_str,
                from.as_str(),
            )
            .await);
        }
        self.fetch(&id_str).await
    }
}

impl<C: Connection> VendorInvoiceRepository for SurrealVendorInvoiceRepository<C> {
    async fn create(&self, input: CreateVendorInvoice) -> CprResult<VendorInvoice> {
        let id = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('vendor_invoice', $id) SET \
                 vendor_id = $vendor_id, invoice_number = $invoice_number, \
                 description = $description, amount_cents = $amount_cents, \
                 invoice_date = $invoice_date, due_date = $due_date, \
                 status = 'pending_submission'",
            )
            .bind(("id", id.clone()))
            .bind(("vendor_id", input.vendor_id.to_string()))
            .bind(("invoice_number", input.invoice_number))
            .bind(("description", input.description))
            .bind(("amount_cents", input.amount_cents))
            .bind(("invoice_date", date_str(input.invoice_date)))
            .bind(("due_date", date_str(input.due_date)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("vendor invoice number", e))?;

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<VendorInvoice> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn update(
        &self,
        id: Uuid,
        from: VendorInvoiceStatus,
        input: UpdateVendorInvoice,
    ) -> CprResult<VendorInvoice> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.invoice_number.is_some() {
            sets.push("invoice_number = $invoice_number");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.amount_cents.is_some() {
            sets.push("amount_cents = $amount_cents");
        }
        if input.invoice_date.is_some() {
            sets.push("invoice_date = $invoice_date");
        }
        if input.due_date.is_some() {
            sets.push("due_date = $due_date");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('vendor_invoice', $id) SET {} WHERE status = $from",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("from", from.as_str()));
        if let Some(invoice_number) = input.invoice_number {
            builder = builder.bind(("invoice_number", invoice_number));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(amount_cents) = input.amount_cents {
            builder = builder.bind(("amount_cents", amount_cents));
        }
        if let Some(invoice_date) = input.invoice_date {
            builder = builder.bind(("invoice_date", date_str(invoice_date)));
        }
        if let Some(due_date) = input.due_date {
            builder = builder.bind(("due_date", date_str(due_date)));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("vendor invoice number", e))?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(stale(
                &self.db,
                "vendor_invoice",
                "vendor invoice",
                &id_str,
                from.as_str(),
            )
            .await
            .into());
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn list(
        &self,
        filter: VendorInvoiceFilter,
        pagination: Pagination,
    ) -> CprResult<PaginatedResult<VendorInvoice>> {
        let mut conditions = vec!["true"];
        if filter.vendor_id.is_some() {
            conditions.push("vendor_id = $vendor_id");
        }
        if !filter.statuses.is_empty() {
            conditions.push("status IN $statuses");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM vendor_invoice WHERE {where_clause} GROUP ALL; \
             {SELECT_FIELDS} FROM vendor_invoice WHERE {where_clause} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );

        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let mut result = self
            .db
            .query(&query)
            .bind(("vendor_id", filter.vendor_id.map(|id| id.to_string())))
            .bind(("statuses", statuses))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<VendorInvoiceRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_vendor_invoice())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn submit(&self, id: Uuid, from: VendorInvoiceStatus) -> CprResult<VendorInvoice> {
        Ok(self
            .transition(
                id,
                "status = 'submitted_to_admin', submitted_at = time::now(), \
                 rejection_reason = NONE",
                from,
                None,
                None,
            )
            .await?)
    }

    async fn approve(&self, id: Uuid) -> CprResult<VendorInvoice> {
        Ok(self
            .transition(
                id,
                "status = 'sent_to_accounting', approved_at = time::now()",
                VendorInvoiceStatus::SubmittedToAdmin,
                None,
                None,
            )
            .await?)
    }

    async fn reject(
        &self,
        id: Uuid,
        from: VendorInvoiceStatus,
        reason: String,
    ) -> CprResult<VendorInvoice> {
        Ok(self
            .transition(
                id,
                "status = 'rejected', rejection_reason = $reason",
                from,
                Some(reason),
                None,
            )
            .await?)
    }

    async fn pay(&self, id: Uuid, reference: Option<String>) -> CprResult<VendorInvoice> {
        Ok(self
            .transition(
                id,
                "status = 'paid', paid_at = time::now(), payment_reference = $reference",
                VendorInvoiceStatus::SentToAccounting,
                None,
                reference,
            )
            .await?)
    }
}
