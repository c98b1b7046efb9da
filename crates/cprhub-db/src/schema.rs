//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. UUIDs and calendar dates (`YYYY-MM-DD`) are
//! stored as strings, money as integer cents, and enums as snake_case
//! strings guarded by ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "default_configuration",
        sql: DEFAULT_CONFIGURATION,
    },
];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations (client companies)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD contact_email ON TABLE organization TYPE string;
DEFINE FIELD contact_phone ON TABLE organization TYPE option<string>;
DEFINE FIELD address ON TABLE organization TYPE option<string>;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_name ON TABLE organization \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['admin', 'instructor', 'organization', 'hr', \
    'accountant', 'vendor', 'sysadmin'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['active', 'inactive'];
DEFINE FIELD full_name ON TABLE user TYPE string;
DEFINE FIELD phone ON TABLE user TYPE option<string>;
DEFINE FIELD organization_id ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_role ON TABLE user COLUMNS role;

-- =======================================================================
-- Revoked access tokens
-- =======================================================================
DEFINE TABLE token_blacklist SCHEMAFULL;
DEFINE FIELD token_hash ON TABLE token_blacklist TYPE string;
DEFINE FIELD user_id ON TABLE token_blacklist TYPE string;
DEFINE FIELD expires_at ON TABLE token_blacklist TYPE datetime;
DEFINE FIELD created_at ON TABLE token_blacklist TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_token_blacklist_hash ON TABLE token_blacklist \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_token_blacklist_expires ON TABLE token_blacklist \
    COLUMNS expires_at;

-- =======================================================================
-- Course catalogue
-- =======================================================================
DEFINE TABLE course_type SCHEMAFULL;
DEFINE FIELD name ON TABLE course_type TYPE string;
DEFINE FIELD description ON TABLE course_type TYPE string DEFAULT '';
DEFINE FIELD duration_minutes ON TABLE course_type TYPE int;
DEFINE FIELD price_per_student_cents ON TABLE course_type TYPE int \
    ASSERT $value >= 0;
DEFINE FIELD max_students ON TABLE course_type TYPE int \
    ASSERT $value > 0;
DEFINE FIELD active ON TABLE course_type TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE course_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE course_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_course_type_name ON TABLE course_type \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Course requests
-- =======================================================================
DEFINE TABLE course_request SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE course_request TYPE string;
DEFINE FIELD course_type_id ON TABLE course_request TYPE string;
DEFINE FIELD instructor_id ON TABLE course_request TYPE option<string>;
DEFINE FIELD location ON TABLE course_request TYPE string;
DEFINE FIELD scheduled_date ON TABLE course_request TYPE string;
DEFINE FIELD expected_students ON TABLE course_request TYPE int;
DEFINE FIELD notes ON TABLE course_request TYPE option<string>;
DEFINE FIELD status ON TABLE course_request TYPE string \
    ASSERT $value IN ['pending', 'confirmed', 'completed', 'cancelled'];
DEFINE FIELD cancellation_reason ON TABLE course_request \
    TYPE option<string>;
DEFINE FIELD confirmed_at ON TABLE course_request TYPE option<datetime>;
DEFINE FIELD completed_at ON TABLE course_request TYPE option<datetime>;
DEFINE FIELD ready_for_billing_at ON TABLE course_request \
    TYPE option<datetime>;
DEFINE FIELD invoiced ON TABLE course_request TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE course_request TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE course_request TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_course_request_org ON TABLE course_request \
    COLUMNS organization_id;
DEFINE INDEX idx_course_request_instructor ON TABLE course_request \
    COLUMNS instructor_id;
DEFINE INDEX idx_course_request_status ON TABLE course_request \
    COLUMNS status;

-- =======================================================================
-- Course rosters
-- =======================================================================
DEFINE TABLE course_student SCHEMAFULL;
DEFINE FIELD course_request_id ON TABLE course_student TYPE string;
DEFINE FIELD first_name ON TABLE course_student TYPE string;
DEFINE FIELD last_name ON TABLE course_student TYPE string;
DEFINE FIELD email ON TABLE course_student TYPE string;
DEFINE FIELD attended ON TABLE course_student TYPE option<bool>;
DEFINE FIELD attendance_marked_at ON TABLE course_student \
    TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE course_student TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_course_student_email ON TABLE course_student \
    COLUMNS course_request_id, email UNIQUE;

-- =======================================================================
-- Instructor availability
-- =======================================================================
DEFINE TABLE instructor_availability SCHEMAFULL;
DEFINE FIELD instructor_id ON TABLE instructor_availability TYPE string;
DEFINE FIELD available_date ON TABLE instructor_availability TYPE string;
DEFINE FIELD created_at ON TABLE instructor_availability TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_availability_instructor_date \
    ON TABLE instructor_availability COLUMNS instructor_id, available_date UNIQUE;

-- =======================================================================
-- Organization invoices and payments
-- =======================================================================
DEFINE TABLE invoice SCHEMAFULL;
DEFINE FIELD invoice_number ON TABLE invoice TYPE string;
DEFINE FIELD course_request_id ON TABLE invoice TYPE string;
DEFINE FIELD organization_id ON TABLE invoice TYPE string;
DEFINE FIELD student_count ON TABLE invoice TYPE int;
DEFINE FIELD rate_per_student_cents ON TABLE invoice TYPE int;
DEFINE FIELD subtotal_cents ON TABLE invoice TYPE int;
DEFINE FIELD tax_cents ON TABLE invoice TYPE int;
DEFINE FIELD total_cents ON TABLE invoice TYPE int;
DEFINE FIELD due_date ON TABLE invoice TYPE string;
DEFINE FIELD status ON TABLE invoice TYPE string \
    ASSERT $value IN ['pending', 'posted', 'paid', 'void'];
DEFINE FIELD posted_at ON TABLE invoice TYPE option<datetime>;
DEFINE FIELD paid_at ON TABLE invoice TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE invoice TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE invoice TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invoice_number ON TABLE invoice \
    COLUMNS invoice_number UNIQUE;
DEFINE INDEX idx_invoice_course ON TABLE invoice \
    COLUMNS course_request_id;
DEFINE INDEX idx_invoice_org ON TABLE invoice COLUMNS organization_id;

DEFINE TABLE payment SCHEMAFULL;
DEFINE FIELD invoice_id ON TABLE payment TYPE string;
DEFINE FIELD amount_cents ON TABLE payment TYPE int ASSERT $value > 0;
DEFINE FIELD method ON TABLE payment TYPE string \
    ASSERT $value IN ['cheque', 'eft', 'credit_card', 'cash', 'other'];
DEFINE FIELD payment_reference ON TABLE payment TYPE option<string>;
DEFINE FIELD payment_date ON TABLE payment TYPE string;
DEFINE FIELD status ON TABLE payment TYPE string \
    ASSERT $value IN ['pending_verification', 'verified', 'rejected'];
DEFINE FIELD submitted_by ON TABLE payment TYPE string;
DEFINE FIELD reviewed_by ON TABLE payment TYPE option<string>;
DEFINE FIELD reviewed_at ON TABLE payment TYPE option<datetime>;
DEFINE FIELD notes ON TABLE payment TYPE option<string>;
DEFINE FIELD created_at ON TABLE payment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_payment_invoice ON TABLE payment COLUMNS invoice_id;

-- =======================================================================
-- Vendor invoices
-- =======================================================================
DEFINE TABLE vendor_invoice SCHEMAFULL;
DEFINE FIELD vendor_id ON TABLE vendor_invoice TYPE string;
DEFINE FIELD invoice_number ON TABLE vendor_invoice TYPE string;
DEFINE FIELD description ON TABLE vendor_invoice TYPE string;
DEFINE FIELD amount_cents ON TABLE vendor_invoice TYPE int \
    ASSERT $value > 0;
DEFINE FIELD invoice_date ON TABLE vendor_invoice TYPE string;
DEFINE FIELD due_date ON TABLE vendor_invoice TYPE string;
DEFINE FIELD status ON TABLE vendor_invoice TYPE string \
    ASSERT $value IN ['pending_submission', 'submitted_to_admin', \
    'sent_to_accounting', 'paid', 'rejected'];
DEFINE FIELD rejection_reason ON TABLE vendor_invoice TYPE option<string>;
DEFINE FIELD submitted_at ON TABLE vendor_invoice TYPE option<datetime>;
DEFINE FIELD approved_at ON TABLE vendor_invoice TYPE option<datetime>;
DEFINE FIELD paid_at ON TABLE vendor_invoice TYPE option<datetime>;
DEFINE FIELD payment_reference ON TABLE vendor_invoice \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE vendor_invoice TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE vendor_invoice TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_vendor_invoice_number ON TABLE vendor_invoice \
    COLUMNS vendor_id, invoice_number UNIQUE;
DEFINE INDEX idx_vendor_invoice_status ON TABLE vendor_invoice \
    COLUMNS status;

-- =======================================================================
-- Timesheets and instructor payment requests
-- =======================================================================
DEFINE TABLE timesheet SCHEMAFULL;
DEFINE FIELD instructor_id ON TABLE timesheet TYPE string;
DEFINE FIELD week_start_date ON TABLE timesheet TYPE string;
DEFINE FIELD hours ON TABLE timesheet TYPE float \
    ASSERT $value > 0 AND $value <= 168;
DEFINE FIELD courses_taught ON TABLE timesheet TYPE int DEFAULT 0;
DEFINE FIELD notes ON TABLE timesheet TYPE option<string>;
DEFINE FIELD status ON TABLE timesheet TYPE string \
    ASSERT $value IN ['pending', 'approved', 'rejected'];
DEFINE FIELD review_comment ON TABLE timesheet TYPE option<string>;
DEFINE FIELD reviewed_by ON TABLE timesheet TYPE option<string>;
DEFINE FIELD reviewed_at ON TABLE timesheet TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE timesheet TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE timesheet TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_timesheet_week ON TABLE timesheet \
    COLUMNS instructor_id, week_start_date UNIQUE;
DEFINE INDEX idx_timesheet_status ON TABLE timesheet COLUMNS status;

DEFINE TABLE payment_request SCHEMAFULL;
DEFINE FIELD instructor_id ON TABLE payment_request TYPE string;
DEFINE FIELD timesheet_id ON TABLE payment_request TYPE string;
DEFINE FIELD amount_cents ON TABLE payment_request TYPE int \
    ASSERT $value >= 0;
DEFINE FIELD status ON TABLE payment_request TYPE string \
    ASSERT $value IN ['pending', 'approved', 'paid', 'rejected'];
DEFINE FIELD notes ON TABLE payment_request TYPE option<string>;
DEFINE FIELD reviewed_by ON TABLE payment_request TYPE option<string>;
DEFINE FIELD reviewed_at ON TABLE payment_request TYPE option<datetime>;
DEFINE FIELD paid_at ON TABLE payment_request TYPE option<datetime>;
DEFINE FIELD payment_reference ON TABLE payment_request \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE payment_request TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE payment_request TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_payment_request_timesheet ON TABLE payment_request \
    COLUMNS timesheet_id UNIQUE;
DEFINE INDEX idx_payment_request_instructor ON TABLE payment_request \
    COLUMNS instructor_id;

-- =======================================================================
-- Profile change requests
-- =======================================================================
DEFINE TABLE profile_change_request SCHEMAFULL;
DEFINE FIELD user_id ON TABLE profile_change_request TYPE string;
DEFINE FIELD field_name ON TABLE profile_change_request TYPE string \
    ASSERT $value IN ['email', 'full_name', 'phone'];
DEFINE FIELD old_value ON TABLE profile_change_request TYPE option<string>;
DEFINE FIELD new_value ON TABLE profile_change_request TYPE string;
DEFINE FIELD status ON TABLE profile_change_request TYPE string \
    ASSERT $value IN ['pending', 'approved', 'rejected'];
DEFINE FIELD review_comment ON TABLE profile_change_request \
    TYPE option<string>;
DEFINE FIELD reviewed_by ON TABLE profile_change_request \
    TYPE option<string>;
DEFINE FIELD reviewed_at ON TABLE profile_change_request \
    TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE profile_change_request TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_profile_change_user ON TABLE profile_change_request \
    COLUMNS user_id;

-- =======================================================================
-- System configuration
-- =======================================================================
DEFINE TABLE system_configuration SCHEMAFULL;
DEFINE FIELD config_key ON TABLE system_configuration TYPE string;
DEFINE FIELD config_value ON TABLE system_configuration TYPE string;
DEFINE FIELD description ON TABLE system_configuration TYPE option<string>;
DEFINE FIELD category ON TABLE system_configuration TYPE string;
DEFINE FIELD updated_by ON TABLE system_configuration TYPE option<string>;
DEFINE FIELD updated_at ON TABLE system_configuration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_system_configuration_key ON TABLE system_configuration \
    COLUMNS config_key UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2: seeded configuration defaults
// -----------------------------------------------------------------------

const DEFAULT_CONFIGURATION: &str = "\
CREATE type::record('system_configuration', 'billing.tax_rate_bps') SET \
    config_key = 'billing.tax_rate_bps', config_value = '1300', \
    category = 'billing', \
    description = 'Sales tax applied to organization invoices, in basis points';
CREATE type::record('system_configuration', 'billing.invoice_due_days') SET \
    config_key = 'billing.invoice_due_days', config_value = '30', \
    category = 'billing', \
    description = 'Days between invoice creation and due date';
CREATE type::record('system_configuration', 'payroll.hourly_rate_cents') SET \
    config_key = 'payroll.hourly_rate_cents', config_value = '2500', \
    category = 'payroll', \
    description = 'Instructor hourly rate in cents';
CREATE type::record('system_configuration', 'payroll.per_course_rate_cents') SET \
    config_key = 'payroll.per_course_rate_cents', config_value = '0', \
    category = 'payroll', \
    description = 'Flat instructor pay per course taught, in cents';
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(version = migration.version, "Migration applied");
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
