//! SurrealDB repository implementations.

mod availability;
mod configuration;
mod course_request;
mod course_student;
mod course_type;
mod invoice;
mod organization;
mod payment;
mod payment_request;
mod profile_change;
mod support;
mod timesheet;
mod token_blacklist;
mod user;
mod vendor_invoice;

pub use availability::SurrealAvailabilityRepository;
pub use configuration::SurrealConfigurationRepository;
pub use course_request::SurrealCourseRequestRepository;
pub use course_student::SurrealCourseStudentRepository;
pub use course_type::SurrealCourseTypeRepository;
pub use invoice::SurrealInvoiceRepository;
pub use organization::SurrealOrganizationRepository;
pub use payment::SurrealPaymentRepository;
pub use payment_request::SurrealPaymentRequestRepository;
pub use profile_change::SurrealProfileChangeRepository;
pub use timesheet::SurrealTimesheetRepository;
pub use token_blacklist::SurrealTokenBlacklistRepository;
pub use user::{SurrealUserRepository, hash_password};
pub use vendor_invoice::SurrealVendorInvoiceRepository;
