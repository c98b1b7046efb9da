//! Runtime business settings stored in the `system_configuration` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CprError, CprResult};

pub const TAX_RATE_BPS: &str = "billing.tax_rate_bps";
pub const INVOICE_DUE_DAYS: &str = "billing.invoice_due_days";
pub const HOURLY_RATE_CENTS: &str = "payroll.hourly_rate_cents";
pub const PER_COURSE_RATE_CENTS: &str = "payroll.per_course_rate_cents";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfiguration {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub category: String,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertConfiguration {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub category: String,
    pub updated_by: Option<Uuid>,
}

/// Keys must be `category.name` in lowercase ASCII.
pub fn validate_key(key: &str) -> CprResult<()> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key.contains('.')
        && !key.starts_with('.')
        && !key.ends_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CprError::validation(format!(
            "configuration key '{key}' must look like 'category.name'"
        )))
    }
}

/// Default category for a key: the segment before the first dot.
pub fn category_of(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

fn lookup<T: std::str::FromStr>(entries: &[SystemConfiguration], key: &str, default: T) -> T {
    entries
        .iter()
        .find(|e| e.key == key)
        .and_then(|e| e.value.trim().parse().ok())
        .unwrap_or(default)
}

/// Settings used when generating organization invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingSettings {
    pub tax_rate_bps: i64,
    pub invoice_due_days: i64,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            tax_rate_bps: 1300,
            invoice_due_days: 30,
        }
    }
}

impl BillingSettings {
    pub fn from_entries(entries: &[SystemConfiguration]) -> Self {
        let d = Self::default();
        Self {
            tax_rate_bps: lookup(entries, TAX_RATE_BPS, d.tax_rate_bps),
            invoice_due_days: lookup(entries, INVOICE_DUE_DAYS, d.invoice_due_days),
        }
    }
}

/// Instructor pay rates applied when a timesheet is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollRates {
    pub hourly_rate_cents: i64,
    pub per_course_rate_cents: i64,
}

impl Default for PayrollRates {
    fn default() -> Self {
        Self {
            hourly_rate_cents: 2500,
            per_course_rate_cents: 0,
        }
    }
}

impl PayrollRates {
    pub fn from_entries(entries: &[SystemConfiguration]) -> Self {
        let d = Self::default();
        Self {
            hourly_rate_cents: lookup(entries, HOURLY_RATE_CENTS, d.hourly_rate_cents),
            per_course_rate_cents: lookup(entries, PER_COURSE_RATE_CENTS, d.per_course_rate_cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> SystemConfiguration {
        SystemConfiguration {
            key: key.into(),
            value: value.into(),
            description: None,
            category: category_of(key).into(),
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn defaults_apply_when_keys_missing() {
        assert_eq!(BillingSettings::from_entries(&[]), BillingSettings::default());
        assert_eq!(PayrollRates::from_entries(&[]), PayrollRates::default());
    }

    #[test]
    fn stored_values_override_defaults() {
        let entries = vec![entry(TAX_RATE_BPS, "500"), entry(HOURLY_RATE_CENTS, " 3000 ")];
        assert_eq!(BillingSettings::from_entries(&entries).tax_rate_bps, 500);
        assert_eq!(PayrollRates::from_entries(&entries).hourly_rate_cents, 3000);
    }

    #[test]
    fn unparsable_value_falls_back_to_default() {
        let entries = vec![entry(INVOICE_DUE_DAYS, "soon")];
        assert_eq!(BillingSettings::from_entries(&entries).invoice_due_days, 30);
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("billing.tax_rate_bps").is_ok());
        assert!(validate_key("nodot").is_err());
        assert!(validate_key("Billing.Tax").is_err());
        assert!(validate_key(".leading").is_err());
    }
}
