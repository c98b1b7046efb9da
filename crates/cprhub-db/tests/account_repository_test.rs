//! Integration tests for organizations, users, the token blacklist and
//! system configuration.

use chrono::{Duration, Utc};
use cprhub_core::error::CprError;
use cprhub_core::models::configuration::UpsertConfiguration;
use cprhub_core::models::organization::{CreateOrganization, UpdateOrganization};
use cprhub_core::models::user::{CreateUser, Role, UpdateUser, UserFilter, UserStatus};
use cprhub_core::repository::{
    ConfigurationRepository, OrganizationRepository, Pagination, TokenBlacklistRepository,
    UserRepository,
};
use cprhub_db::repository::{
    SurrealConfigurationRepository, SurrealOrganizationRepository,
    SurrealTokenBlacklistRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cprhub_db::run_migrations(&db).await.unwrap();
    db
}

fn new_user(username: &str, role: Role) -> CreateUser {
    CreateUser {
        username: username.into(),
        email: format!("{username}@example.com"),
        password: "CorrectHorse42!".into(),
        role,
        full_name: format!("{username} Tester"),
        phone: None,
        organization_id: None,
    }
}

#[tokio::test]
async fn create_update_and_list_organizations() {
    let db = setup().await;
    let repo = SurrealOrganizationRepository::new(db);

    let acme = repo
        .create(CreateOrganization {
            name: "Acme Safety".into(),
            contact_email: "office@acme.test".into(),
            contact_phone: Some("555-0100".into()),
            address: None,
        })
        .await
        .unwrap();
    assert_eq!(repo.get_by_id(acme.id).await.unwrap().name, "Acme Safety");

    let updated = repo
        .update(
            acme.id,
            UpdateOrganization {
                address: Some("1 Main St".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.address.as_deref(), Some("1 Main St"));
    assert_eq!(updated.contact_phone.as_deref(), Some("555-0100"));

    repo.create(CreateOrganization {
        name: "Beta Builders".into(),
        contact_email: "hello@beta.test".into(),
        contact_phone: None,
        address: None,
    })
    .await
    .unwrap();

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 1,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Acme Safety");
}

#[tokio::test]
async fn duplicate_organization_name_is_rejected() {
    let db = setup().await;
    let repo = SurrealOrganizationRepository::new(db);
    let input = CreateOrganization {
        name: "Acme".into(),
        contact_email: "a@acme.test".into(),
        contact_phone: None,
        address: None,
    };
    repo.create(input.clone()).await.unwrap();
    let err = repo.create(input).await.unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }), "{err:?}");
}

#[tokio::test]
async fn missing_organization_is_not_found() {
    let db = setup().await;
    let repo = SurrealOrganizationRepository::new(db);
    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CprError::NotFound { .. }));
}

#[tokio::test]
async fn create_and_look_up_users() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo.create(new_user("alice", Role::Instructor)).await.unwrap();
    assert_eq!(user.role, Role::Instructor);
    assert_eq!(user.status, UserStatus::Active);
    assert!(user.password_hash.starts_with("$argon2id$"));

    assert_eq!(repo.get_by_username("alice").await.unwrap().id, user.id);
    assert_eq!(
        repo.get_by_email("alice@example.com").await.unwrap().id,
        user.id
    );
    assert!(matches!(
        repo.get_by_username("nobody").await.unwrap_err(),
        CprError::NotFound { .. }
    ));
}

#[tokio::test]
async fn duplicate_username_or_email_is_rejected() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    repo.create(new_user("bob", Role::Hr)).await.unwrap();

    let err = repo.create(new_user("bob", Role::Hr)).await.unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }));

    let mut other = new_user("robert", Role::Hr);
    other.email = "bob@example.com".into();
    let err = repo.create(other).await.unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_clears_optional_fields() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    let mut input = new_user("carol", Role::Organization);
    input.phone = Some("555-0199".into());
    input.organization_id = Some(Uuid::new_v4());
    let user = repo.create(input).await.unwrap();

    let updated = repo
        .update(
            user.id,
            UpdateUser {
                full_name: Some("Carol Example".into()),
                phone: Some(None),
                organization_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Carol Example");
    assert!(updated.phone.is_none());
    assert!(updated.organization_id.is_none());
}

#[tokio::test]
async fn soft_delete_and_filtered_listing() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    let a = repo.create(new_user("ann", Role::Instructor)).await.unwrap();
    repo.create(new_user("ben", Role::Instructor)).await.unwrap();
    repo.create(new_user("cat", Role::Accountant)).await.unwrap();

    repo.delete(a.id).await.unwrap();
    assert_eq!(
        repo.get_by_id(a.id).await.unwrap().status,
        UserStatus::Inactive
    );

    let instructors = repo
        .list(
            UserFilter {
                role: Some(Role::Instructor),
                status: Some(UserStatus::Active),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(instructors.total, 1);
    assert_eq!(instructors.items[0].username, "ben");
}

#[tokio::test]
async fn set_password_replaces_hash() {
    let db = setup().await;
    let repo = SurrealUserRepository::with_pepper(db, "pepper".into());
    let user = repo.create(new_user("dan", Role::Admin)).await.unwrap();

    repo.set_password(user.id, "AnotherSecret7!").await.unwrap();
    let reloaded = repo.get_by_id(user.id).await.unwrap();
    assert_ne!(reloaded.password_hash, user.password_hash);
}

#[tokio::test]
async fn blacklist_add_is_idempotent_and_cleanup_drops_expired() {
    let db = setup().await;
    let repo = SurrealTokenBlacklistRepository::new(db);
    let user_id = Uuid::new_v4();

    repo.add("live", user_id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    repo.add("live", user_id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    repo.add("stale", user_id, Utc::now() - Duration::minutes(5))
        .await
        .unwrap();

    assert!(repo.is_blacklisted("live").await.unwrap());
    assert!(repo.is_blacklisted("stale").await.unwrap());
    assert!(!repo.is_blacklisted("other").await.unwrap());

    assert_eq!(repo.cleanup_expired().await.unwrap(), 1);
    assert!(!repo.is_blacklisted("stale").await.unwrap());
    assert!(repo.is_blacklisted("live").await.unwrap());
}

#[tokio::test]
async fn configuration_upsert_get_and_delete() {
    let db = setup().await;
    let repo = SurrealConfigurationRepository::new(db);
    let admin = Uuid::new_v4();

    let entry = repo
        .upsert(UpsertConfiguration {
            key: "billing.tax_rate_bps".into(),
            value: "500".into(),
            description: None,
            category: "billing".into(),
            updated_by: Some(admin),
        })
        .await
        .unwrap();
    assert_eq!(entry.value, "500");
    assert_eq!(entry.updated_by, Some(admin));
    // Seeded description survives an update without one.
    assert!(entry.description.is_some());

    repo.upsert(UpsertConfiguration {
        key: "portal.banner".into(),
        value: "Closed on holidays".into(),
        description: Some("Shown on the login page".into()),
        category: "portal".into(),
        updated_by: None,
    })
    .await
    .unwrap();
    assert_eq!(repo.get("portal.banner").await.unwrap().category, "portal");

    repo.delete("portal.banner").await.unwrap();
    assert!(matches!(
        repo.get("portal.banner").await.unwrap_err(),
        CprError::NotFound { .. }
    ));
    assert!(matches!(
        repo.delete("portal.banner").await.unwrap_err(),
        CprError::NotFound { .. }
    ));
}
