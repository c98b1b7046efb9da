//! Application state for the API server

use std::sync::Arc;

use cprhub_auth::{AuthConfig, AuthService};
use cprhub_core::error::CprResult;
use cprhub_core::models::configuration::{BillingSettings, PayrollRates};
use cprhub_core::repository::ConfigurationRepository;
use cprhub_db::repository::{
    SurrealAvailabilityRepository, SurrealConfigurationRepository, SurrealCourseRequestRepository,
    SurrealCourseStudentRepository, SurrealCourseTypeRepository, SurrealInvoiceRepository,
    SurrealOrganizationRepository, SurrealPaymentRepository, SurrealPaymentRequestRepository,
    SurrealProfileChangeRepository, SurrealTimesheetRepository, SurrealTokenBlacklistRepository,
    SurrealUserRepository, SurrealVendorInvoiceRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

pub type Auth = AuthService<SurrealUserRepository<Any>, SurrealTokenBlacklistRepository<Any>>;

/// API server state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub users: SurrealUserRepository<Any>,
    pub organizations: SurrealOrganizationRepository<Any>,
    pub course_types: SurrealCourseTypeRepository<Any>,
    pub courses: SurrealCourseRequestRepository<Any>,
    pub students: SurrealCourseStudentRepository<Any>,
    pub availability: SurrealAvailabilityRepository<Any>,
    pub invoices: SurrealInvoiceRepository<Any>,
    pub payments: SurrealPaymentRepository<Any>,
    pub vendor_invoices: SurrealVendorInvoiceRepository<Any>,
    pub timesheets: SurrealTimesheetRepository<Any>,
    pub payment_requests: SurrealPaymentRequestRepository<Any>,
    pub profile_changes: SurrealProfileChangeRepository<Any>,
    pub configuration: SurrealConfigurationRepository<Any>,
    pub version: String,
}

impl AppState {
    /// Build state over a migrated database.
    pub fn new(db: Surreal<Any>, auth_config: AuthConfig) -> Self {
        let users = match &auth_config.pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(db.clone()),
        };
        let auth = AuthService::new(
            users.clone(),
            SurrealTokenBlacklistRepository::new(db.clone()),
            auth_config,
        );

        Self {
            auth: Arc::new(auth),
            users,
            organizations: SurrealOrganizationRepository::new(db.clone()),
            course_types: SurrealCourseTypeRepository::new(db.clone()),
            courses: SurrealCourseRequestRepository::new(db.clone()),
            students: SurrealCourseStudentRepository::new(db.clone()),
            availability: SurrealAvailabilityRepository::new(db.clone()),
            invoices: SurrealInvoiceRepository::new(db.clone()),
            payments: SurrealPaymentRepository::new(db.clone()),
            vendor_invoices: SurrealVendorInvoiceRepository::new(db.clone()),
            timesheets: SurrealTimesheetRepository::new(db.clone()),
            payment_requests: SurrealPaymentRequestRepository::new(db.clone()),
            profile_changes: SurrealProfileChangeRepository::new(db.clone()),
            configuration: SurrealConfigurationRepository::new(db),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub async fn billing_settings(&self) -> CprResult<BillingSettings> {
        let entries = self.configuration.list(Some("billing".into())).await?;
        Ok(BillingSettings::from_entries(&entries))
    }

    pub async fn payroll_rates(&self) -> CprResult<PayrollRates> {
        let entries = self.configuration.list(Some("payroll".into())).await?;
        Ok(PayrollRates::from_entries(&entries))
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Seconds between blacklist sweeps; `0` disables the task.
    pub blacklist_cleanup_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: false,
            blacklist_cleanup_interval_secs: 3600,
        }
    }
}
