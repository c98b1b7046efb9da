//! Billing arithmetic.
//!
//! All money is integer cents. Rates expressed as basis points are
//! rounded half-up.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use uuid::Uuid;

use crate::error::{CprError, CprResult};
use crate::models::configuration::{BillingSettings, PayrollRates};
use crate::models::invoice::Invoice;
use crate::models::payment::{Payment, PaymentStatus};

/// Amounts for an organization invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceQuote {
    pub student_count: u32,
    pub rate_per_student_cents: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl InvoiceQuote {
    pub fn compute(
        student_count: u32,
        rate_per_student_cents: i64,
        settings: &BillingSettings,
    ) -> CprResult<Self> {
        if rate_per_student_cents < 0 {
            return Err(CprError::validation("rate per student must not be negative"));
        }
        if settings.tax_rate_bps < 0 {
            return Err(CprError::validation("tax rate must not be negative"));
        }
        let subtotal = i64::from(student_count)
            .checked_mul(rate_per_student_cents)
            .ok_or_else(|| CprError::validation("invoice subtotal overflows"))?;
        let tax = apply_bps(subtotal, settings.tax_rate_bps)?;
        Ok(Self {
            student_count,
            rate_per_student_cents,
            subtotal_cents: subtotal,
            tax_cents: tax,
            total_cents: subtotal + tax,
        })
    }
}

fn apply_bps(amount: i64, bps: i64) -> CprResult<i64> {
    amount
        .checked_mul(bps)
        .map(|v| (v + 5_000) / 10_000)
        .ok_or_else(|| CprError::validation("tax computation overflows"))
}

/// Human-facing invoice number, unique because it embeds the id prefix.
pub fn invoice_number(issued_on: NaiveDate, id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("INV-{}-{}", issued_on.format("%Y%m%d"), &simple[..8])
}

pub fn due_date(issued_on: NaiveDate, settings: &BillingSettings) -> NaiveDate {
    issued_on + Duration::days(settings.invoice_due_days.max(0))
}

/// Pay owed for an approved timesheet.
pub fn instructor_pay_cents(hours: f64, courses_taught: u32, rates: &PayrollRates) -> i64 {
    let hourly = (hours * rates.hourly_rate_cents as f64).round() as i64;
    hourly + i64::from(courses_taught) * rates.per_course_rate_cents
}

/// Payment position of one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub paid_cents: i64,
    pub pending_cents: i64,
    pub due_cents: i64,
}

impl Balance {
    pub fn of(invoice: &Invoice, payments: &[Payment]) -> Self {
        let sum = |status: PaymentStatus| -> i64 {
            payments
                .iter()
                .filter(|p| p.invoice_id == invoice.id && p.status == status)
                .map(|p| p.amount_cents)
                .sum()
        };
        let paid = sum(PaymentStatus::Verified);
        let pending = sum(PaymentStatus::PendingVerification);
        Self {
            paid_cents: paid,
            pending_cents: pending,
            due_cents: (invoice.total_cents - paid).max(0),
        }
    }

    /// Largest amount a new unverified payment may claim.
    pub fn submittable_cents(&self) -> i64 {
        (self.due_cents - self.pending_cents).max(0)
    }
}

pub fn is_overdue(invoice: &Invoice, balance: &Balance, now: DateTime<Utc>) -> bool {
    balance.due_cents > 0 && invoice.due_date < now.date_naive()
}

/// Timesheet weeks start on Monday.
pub fn is_week_start(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::InvoiceStatus;
    use crate::models::payment::PaymentMethod;

    fn invoice(total: i64, due: NaiveDate) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-1".into(),
            course_request_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            student_count: 1,
            rate_per_student_cents: total,
            subtotal_cents: total,
            tax_cents: 0,
            total_cents: total,
            due_date: due,
            status: InvoiceStatus::Posted,
            posted_at: Some(now),
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(invoice_id: Uuid, amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            invoice_id,
            amount_cents: amount,
            method: PaymentMethod::Eft,
            reference: None,
            payment_date: Utc::now().date_naive(),
            status,
            submitted_by: Uuid::new_v4(),
            reviewed_by: None,
            reviewed_at: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn quote_applies_tax_half_up() {
        let settings = BillingSettings {
            tax_rate_bps: 1300,
            invoice_due_days: 30,
        };
        let q = InvoiceQuote::compute(12, 8_999, &settings).unwrap();
        assert_eq!(q.subtotal_cents, 107_988);
        // 107_988 * 0.13 = 14_038.44
        assert_eq!(q.tax_cents, 14_038);
        assert_eq!(q.total_cents, 122_026);

        let q = InvoiceQuote::compute(1, 50, &settings).unwrap();
        // 6.5 rounds up
        assert_eq!(q.tax_cents, 7);
    }

    #[test]
    fn quote_rejects_negative_rate() {
        assert!(InvoiceQuote::compute(3, -1, &BillingSettings::default()).is_err());
    }

    #[test]
    fn zero_students_bill_nothing() {
        let q = InvoiceQuote::compute(0, 10_000, &BillingSettings::default()).unwrap();
        assert_eq!(q.total_cents, 0);
    }

    #[test]
    fn invoice_number_format() {
        let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(invoice_number(date, id), "INV-20260309-1A2B3C4D");
    }

    #[test]
    fn pay_combines_hours_and_courses() {
        let rates = PayrollRates {
            hourly_rate_cents: 2_550,
            per_course_rate_cents: 1_000,
        };
        assert_eq!(instructor_pay_cents(7.5, 2, &rates), 19_125 + 2_000);
        assert_eq!(instructor_pay_cents(0.25, 0, &rates), 638);
    }

    #[test]
    fn balance_counts_only_verified_payments() {
        let inv = invoice(10_000, Utc::now().date_naive());
        let payments = vec![
            payment(inv.id, 3_000, PaymentStatus::Verified),
            payment(inv.id, 2_000, PaymentStatus::PendingVerification),
            payment(inv.id, 4_000, PaymentStatus::Rejected),
            payment(Uuid::new_v4(), 9_000, PaymentStatus::Verified),
        ];
        let b = Balance::of(&inv, &payments);
        assert_eq!(b.paid_cents, 3_000);
        assert_eq!(b.pending_cents, 2_000);
        assert_eq!(b.due_cents, 7_000);
        assert_eq!(b.submittable_cents(), 5_000);
    }

    #[test]
    fn overdue_requires_past_due_date_and_balance() {
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let inv = invoice(5_000, yesterday);
        let unpaid = Balance::of(&inv, &[]);
        assert!(is_overdue(&inv, &unpaid, Utc::now()));

        let settled = Balance::of(&inv, &[payment(inv.id, 5_000, PaymentStatus::Verified)]);
        assert!(!is_overdue(&inv, &settled, Utc::now()));
    }

    #[test]
    fn week_start_is_monday() {
        assert!(is_week_start(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()));
        assert!(!is_week_start(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()));
    }
}
