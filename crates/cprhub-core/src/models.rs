//! Domain models for CPRHub.
//!
//! These are the core types shared across all crates. Status and
//! category enums serialize as snake_case strings, which is also the
//! form they are persisted in.

pub mod analytics;
pub mod availability;
pub mod configuration;
pub mod course_request;
pub mod course_student;
pub mod course_type;
pub mod invoice;
pub mod organization;
pub mod payment;
pub mod payment_request;
pub mod profile_change;
pub mod timesheet;
pub mod token_blacklist;
pub mod user;
pub mod vendor_invoice;
