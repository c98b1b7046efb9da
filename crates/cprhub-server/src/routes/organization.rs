//! Organization portal: the organization's own invoices and payment
//! submissions.

use axum::extract::State;
use chrono::Utc;
use cprhub_core::error::CprError;
use cprhub_core::models::invoice::{Invoice, InvoiceFilter, InvoiceStatus, InvoiceSummary};
use cprhub_core::models::payment::{CreatePayment, Payment, PaymentStatus};
use cprhub_core::models::user::Role;
use cprhub_core::repository::{InvoiceRepository, PaginatedResult, PaymentRepository};
use tracing::info;
use uuid::Uuid;

use crate::dto::{InvoiceDetail, InvoiceListQuery, PaymentBody};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::routes::accounting::{check_payment_amount, invoice_detail, invoice_page};
use crate::state::AppState;

/// Posted or paid invoice belonging to the caller's organization.
async fn own_invoice(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Invoice> {
    user.require(&[Role::Organization])?;
    let organization_id = user.organization_id()?;
    let invoice = state.invoices.get_by_id(id).await?;
    if invoice.organization_id != organization_id
        || !InvoiceStatus::VISIBLE_TO_ORGANIZATION.contains(&invoice.status)
    {
        return Err(CprError::not_found("invoice", id).into());
    }
    Ok(invoice)
}

pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<InvoiceListQuery>,
) -> Reply<PaginatedResult<InvoiceSummary>> {
    user.require(&[Role::Organization])?;
    let visible = InvoiceStatus::VISIBLE_TO_ORGANIZATION;
    let statuses = match query.status {
        Some(s) if visible.contains(&s) => vec![s],
        Some(s) => {
            return Err(ApiError::validation(format!(
                "invoices in status {s} are not visible to organizations"
            )));
        }
        None => visible.to_vec(),
    };
    let filter = InvoiceFilter {
        organization_id: Some(user.organization_id()?),
        statuses,
    };
    ok(invoice_page(&state, filter, &query).await?)
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<InvoiceDetail> {
    let invoice = own_invoice(&state, &user, id).await?;
    ok(invoice_detail(&state, invoice).await?)
}

/// Report a payment. It stays pending until accounting verifies it, and
/// may not exceed what is due less other pending submissions.
pub async fn submit_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PaymentBody>,
) -> Created<Payment> {
    let invoice = own_invoice(&state, &user, id).await?;
    let detail = invoice_detail(&state, invoice).await?;
    check_payment_amount(&detail.summary, body.amount_cents, true)?;

    let payment = state
        .payments
        .create(CreatePayment {
            invoice_id: id,
            amount_cents: body.amount_cents,
            method: body.method,
            reference: body.reference,
            payment_date: body.payment_date.unwrap_or_else(|| Utc::now().date_naive()),
            submitted_by: user.id(),
            notes: body.notes,
            status: PaymentStatus::PendingVerification,
        })
        .await?;
    info!(payment_id = %payment.id, invoice_id = %id, amount_cents = payment.amount_cents, "payment submitted");
    created(payment)
}
