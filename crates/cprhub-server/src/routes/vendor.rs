//! Vendor portal.

use axum::extract::State;
use chrono::NaiveDate;
use cprhub_core::error::CprError;
use cprhub_core::models::user::Role;
use cprhub_core::models::vendor_invoice::{
    CreateVendorInvoice, UpdateVendorInvoice, VendorInvoice, VendorInvoiceFilter,
};
use cprhub_core::repository::{PaginatedResult, VendorInvoiceRepository};
use cprhub_core::workflow::{VendorInvoiceAction, Workflow};
use tracing::info;
use uuid::Uuid;

use crate::dto::{VendorInvoiceBody, VendorInvoiceListQuery};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

async fn own_invoice(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<VendorInvoice> {
    user.require(&[Role::Vendor])?;
    let invoice = state.vendor_invoices.get_by_id(id).await?;
    if invoice.vendor_id != user.id() {
        return Err(CprError::not_found("vendor invoice", id).into());
    }
    Ok(invoice)
}

fn check_fields(
    invoice_number: &str,
    description: &str,
    amount_cents: i64,
    invoice_date: NaiveDate,
    due_date: NaiveDate,
) -> ApiResult<()> {
    if invoice_number.trim().is_empty() {
        return Err(ApiError::validation("invoice number must not be empty"));
    }
    if description.trim().is_empty() {
        return Err(ApiError::validation("description must not be empty"));
    }
    if amount_cents <= 0 {
        return Err(ApiError::validation("amount must be positive"));
    }
    if due_date < invoice_date {
        return Err(ApiError::validation("due date must not precede the invoice date"));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<VendorInvoiceListQuery>,
) -> Reply<PaginatedResult<VendorInvoice>> {
    user.require(&[Role::Vendor])?;
    let filter = VendorInvoiceFilter {
        vendor_id: Some(user.id()),
        statuses: query.status.into_iter().collect(),
    };
    ok(state
        .vendor_invoices
        .list(filter, query.pagination())
        .await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<VendorInvoiceBody>,
) -> Created<VendorInvoice> {
    user.require(&[Role::Vendor])?;
    check_fields(
        &body.invoice_number,
        &body.description,
        body.amount_cents,
        body.invoice_date,
        body.due_date,
    )?;

    let invoice = state
        .vendor_invoices
        .create(CreateVendorInvoice {
            vendor_id: user.id(),
            invoice_number: body.invoice_number.trim().to_string(),
            description: body.description,
            amount_cents: body.amount_cents,
            invoice_date: body.invoice_date,
            due_date: body.due_date,
        })
        .await?;
    info!(vendor_invoice_id = %invoice.id, vendor_id = %invoice.vendor_id, "vendor invoice drafted");
    created(invoice)
}

/// Edit a draft or rejected invoice.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut input): ApiJson<UpdateVendorInvoice>,
) -> Reply<VendorInvoice> {
    let invoice = own_invoice(&state, &user, id).await?;
    if !invoice.status.is_editable() {
        return Err(ApiError::conflict(format!(
            "vendor invoice {} is {} and can no longer be edited",
            invoice.invoice_number, invoice.status
        )));
    }

    if let Some(number) = input.invoice_number.as_mut() {
        *number = number.trim().to_string();
    }
    check_fields(
        input.invoice_number.as_deref().unwrap_or(&invoice.invoice_number),
        input.description.as_deref().unwrap_or(&invoice.description),
        input.amount_cents.unwrap_or(invoice.amount_cents),
        input.invoice_date.unwrap_or(invoice.invoice_date),
        input.due_date.unwrap_or(invoice.due_date),
    )?;

    ok(state
        .vendor_invoices
        .update(id, invoice.status, input)
        .await?)
}

pub async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<VendorInvoice> {
    let invoice = own_invoice(&state, &user, id).await?;
    invoice.status.apply(VendorInvoiceAction::Submit)?;

    let submitted = state.vendor_invoices.submit(id, invoice.status).await?;
    info!(vendor_invoice_id = %id, "vendor invoice submitted");
    ok(submitted)
}
