//! SurrealDB implementation of [`PaymentRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::payment::{CreatePayment, Payment, PaymentMethod, PaymentStatus};
use cprhub_core::repository::PaymentRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use uuid::Uuid;

use super::support::{
    current_status, date_str, not_found, parse_date, parse_enum, parse_opt_uuid, parse_uuid, stale,
    write_error,
};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

/// Marks the invoice paid once verified payments cover its total.
/// Expects `$invoice_id` to be set.
const SETTLE_INVOICE: &str = "\
LET $amounts = (SELECT VALUE amount_cents FROM payment \
    WHERE invoice_id = $invoice_id AND status = 'verified'); \
UPDATE type::record('invoice', $invoice_id) SET status = 'paid', \
    paid_at = time::now(), updated_at = time::now() \
    WHERE status = 'posted' AND total_cents <= math::sum($amounts);";

const OVER_BALANCE: &str = "payment exceeds invoice balance";

/// Throws unless the invoice is posted and the payments in `counted`
/// plus `$amount_cents` stay within its total. Expects `$invoice_id`
/// and `$amount_cents` to be set.
fn invoice_guard(counted: &str) -> String {
    format!(
        "LET $invoice = (SELECT status, total_cents FROM type::record('invoice', $invoice_id)); \
         IF array::len($invoice) = 0 OR $invoice[0].status != 'posted' \
             {{ THROW 'invoice is not posted' }}; \
         LET $committed = math::sum((SELECT VALUE amount_cents FROM payment \
             WHERE invoice_id = $invoice_id AND status IN [{counted}])); \
         IF $committed + $amount_cents > $invoice[0].total_cents \
             {{ THROW '{OVER_BALANCE}' }};"
    )
}

#[derive(Debug, SurrealValue)]
struct PaymentRow {
    record_id: String,
    invoice_id: String,
    amount_cents: i64,
    method: String,
    payment_reference: Option<String>,
    payment_date: String,
    status: String,
    submitted_by: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn try_into_payment(self) -> Result<Payment, DbError> {
        Ok(Payment {
            id: parse_uuid("payment", &self.record_id)?,
            invoice_id: parse_uuid("invoice", &self.invoice_id)?,
            amount_cents: self.amount_cents,
            method: parse_enum::<PaymentMethod>("payment method", &self.method)?,
            reference: self.payment_reference,
            payment_date: parse_date("payment_date", &self.payment_date)?,
            status: parse_enum::<PaymentStatus>("payment status", &self.status)?,
            submitted_by: parse_uuid("submitted_by", &self.submitted_by)?,
            reviewed_by: parse_opt_uuid("reviewed_by", self.reviewed_by)?,
            reviewed_at: self.reviewed_at,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Payment repository.
#[derive(Clone)]
pub struct SurrealPaymentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPaymentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Payment, DbError> {
        let query = format!("{SELECT_FIELDS} FROM type::record('payment', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<PaymentRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("payment", id))?
            .try_into_payment()
    }

    async fn list_where(
        &self,
        condition: &str,
        invoice_ids: Vec<String>,
    ) -> CprResult<Vec<Payment>> {
        let query = format!(
            "{SELECT_FIELDS} FROM payment WHERE {condition} ORDER BY created_at ASC"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("invoice_ids", invoice_ids))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<PaymentRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_payment())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    /// Explain why a guarded payment write against `invoice_id` failed.
    async fn refusal(&self, invoice_id: &str, amount_cents: i64, err: String) -> DbError {
        match current_status(&self.db, "invoice", invoice_id).await {
            Ok(None) => not_found("invoice", invoice_id),
            Ok(Some(status)) if status != "posted" => DbError::Conflict(format!(
                "invoice {invoice_id} is {status}, payments are accepted only on posted invoices"
            )),
            Ok(Some(_)) if err.contains(OVER_BALANCE) => DbError::Conflict(format!(
                "payment of {amount_cents} cents exceeds what invoice {invoice_id} may still collect"
            )),
            Ok(Some(_)) => write_error("payment", err),
            Err(e) => e,
        }
    }
}

impl<C: Connection> PaymentRepository for SurrealPaymentRepository<C> {
    async fn create(&self, input: CreatePayment) -> CprResult<Payment> {
        let id = Uuid::new_v4().to_string();
        let invoice_id = input.invoice_id.to_string();
        // Payments recorded by accounting are verified on entry.
        let reviewed = input.status == PaymentStatus::Verified;
        let (counted, review_set, settle) = if reviewed {
            (
                "'verified'",
                ", reviewed_by = $submitted_by, reviewed_at = time::now()",
                SETTLE_INVOICE,
            )
        } else {
            ("'verified', 'pending_verification'", "", "")
        };
        let query = format!(
            "BEGIN TRANSACTION; \
             {guard} \
             CREATE type::record('payment', $id) SET \
                 invoice_id = $invoice_id, amount_cents = $amount_cents, \
                 method = $method, payment_reference = $reference, \
                 payment_date = $payment_date, status = $status, \
                 submitted_by = $submitted_by, notes = $notes{review_set}; \
             {settle} \
             COMMIT TRANSACTION;",
            guard = invoice_guard(counted),
        );

        let outcome = self
            .db
            .query(&query)
            .bind(("id", id.clone()))
            .bind(("invoice_id", invoice_id.clone()))
            .bind(("amount_cents", input.amount_cents))
            .bind(("method", input.method.as_str()))
            .bind(("reference", input.reference))
            .bind(("payment_date", date_str(input.payment_date)))
            .bind(("status", input.status.as_str()))
            .bind(("submitted_by", input.submitted_by.to_string()))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(invoice_id = %invoice_id, error = %e, "Payment rolled back");
            return Err(self
                .refusal(&invoice_id, input.amount_cents, e.to_string())
                .await
                .into());
        }

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<Payment> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn list_for_invoice(&self, invoice_id: Uuid) -> CprResult<Vec<Payment>> {
        self.list_where("invoice_id IN $invoice_ids", vec![invoice_id.to_string()])
            .await
    }

    async fn list_for_invoices(&self, invoice_ids: &[Uuid]) -> CprResult<Vec<Payment>> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = invoice_ids.iter().map(Uuid::to_string).collect();
        self.list_where("invoice_id IN $invoice_ids", ids).await
    }

    async fn list_all(&self) -> CprResult<Vec<Payment>> {
        self.list_where("true", Vec::new()).await
    }

    async fn verify(&self, id: Uuid, reviewer: Uuid) -> CprResult<Payment> {
        let id_str = id.to_string();
        let payment = self.fetch(&id_str).await?;
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $pending = (SELECT invoice_id, amount_cents \
                 FROM type::record('payment', $id) \
                 WHERE status = 'pending_verification'); \
             IF array::len($pending) = 0 {{ THROW 'payment changed concurrently' }}; \
             LET $invoice_id = $pending[0].invoice_id; \
             LET $amount_cents = $pending[0].amount_cents; \
             {guard} \
             UPDATE type::record('payment', $id) SET \
                 status = 'verified', reviewed_by = $reviewer, \
                 reviewed_at = time::now(); \
             {SETTLE_INVOICE} \
             COMMIT TRANSACTION;",
            guard = invoice_guard("'verified'"),
        );

        let outcome = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("reviewer", reviewer.to_string()))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(payment_id = %id, error = %e, "Verification rolled back");
            let still_pending = current_status(&self.db, "payment", &id_str).await?;
            if still_pending.as_deref() != Some("pending_verification") {
                return Err(stale(
                    &self.db,
                    "payment",
                    "payment",
                    &id_str,
                    "pending_verification",
                )
                .await
                .into());
            }
            let invoice_id = payment.invoice_id.to_string();
            return Err(self
                .refusal(&invoice_id, payment.amount_cents, e.to_string())
                .await
                .into());
        }

        let payment = self.fetch(&id_str).await?;
        info!(payment_id = %id, invoice_id = %payment.invoice_id, "Payment verified");
        Ok(payment)
    }

    async fn reject(&self, id: Uuid, reviewer: Uuid, notes: Option<String>) -> CprResult<Payment> {
        let id_str = id.to_string();
        let notes_set = if notes.is_some() { ", notes = $notes" } else { "" };
        let query = format!(
            "UPDATE type::record('payment', $id) SET status = 'rejected', \
             reviewed_by = $reviewer, reviewed_at = time::now(){notes_set} \
             WHERE status = 'pending_verification'"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("reviewer", reviewer.to_string()))
            .bind(("notes", notes))
            .await
            .map_err(DbError::from)?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(stale(
                &self.db,
                "payment",
                "payment",
                &id_str,
                "pending_verification",
            )
            .await
            .into());
        }
        Ok(self.fetch(&id_str).await?)
    }
}
