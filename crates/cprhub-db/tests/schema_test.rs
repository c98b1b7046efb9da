//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    cprhub_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "organization",
        "user",
        "token_blacklist",
        "course_type",
        "course_request",
        "course_student",
        "instructor_availability",
        "invoice",
        "payment",
        "vendor_invoice",
        "timesheet",
        "payment_request",
        "profile_change_request",
        "system_configuration",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    cprhub_db::run_migrations(&db).await.unwrap();
    cprhub_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 2, "expected one record per migration");
}

#[tokio::test]
async fn default_configuration_is_seeded() {
    use cprhub_core::models::configuration::{BillingSettings, PayrollRates};
    use cprhub_core::repository::ConfigurationRepository;
    use cprhub_db::repository::SurrealConfigurationRepository;

    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cprhub_db::run_migrations(&db).await.unwrap();

    let repo = SurrealConfigurationRepository::new(db);
    let entries = repo.list(None).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(BillingSettings::from_entries(&entries), BillingSettings::default());
    assert_eq!(PayrollRates::from_entries(&entries), PayrollRates::default());

    let billing = repo.list(Some("billing".into())).await.unwrap();
    assert_eq!(billing.len(), 2);
}
