//! Integration tests for profile change requests.

use cprhub_core::error::CprError;
use cprhub_core::models::profile_change::{
    CreateProfileChange, ProfileChangeStatus, ProfileField,
};
use cprhub_core::models::user::{CreateUser, Role};
use cprhub_core::repository::{ProfileChangeRepository, UserRepository};
use cprhub_db::repository::{SurrealProfileChangeRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (
    SurrealUserRepository<Db>,
    SurrealProfileChangeRepository<Db>,
) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cprhub_db::run_migrations(&db).await.unwrap();
    (
        SurrealUserRepository::new(db.clone()),
        SurrealProfileChangeRepository::new(db),
    )
}

fn user(username: &str) -> CreateUser {
    CreateUser {
        username: username.into(),
        email: format!("{username}@example.com"),
        password: "CorrectHorse42!".into(),
        role: Role::Instructor,
        full_name: "Original Name".into(),
        phone: None,
        organization_id: None,
    }
}

fn change(user_id: Uuid, field: ProfileField, value: &str) -> CreateProfileChange {
    CreateProfileChange {
        user_id,
        field,
        old_value: None,
        new_value: value.into(),
    }
}

#[tokio::test]
async fn approval_applies_change_to_user() {
    let (users, changes) = setup().await;
    let u = users.create(user("gina")).await.unwrap();

    let req = changes
        .create(change(u.id, ProfileField::FullName, "Gina Rivera"))
        .await
        .unwrap();
    assert_eq!(req.status, ProfileChangeStatus::Pending);

    let approved = changes
        .approve(req.id, Uuid::new_v4(), Some("Verified ID".into()))
        .await
        .unwrap();
    assert_eq!(approved.status, ProfileChangeStatus::Approved);
    assert_eq!(users.get_by_id(u.id).await.unwrap().full_name, "Gina Rivera");

    let err = changes
        .approve(req.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)));
}

#[tokio::test]
async fn one_pending_request_per_field() {
    let (users, changes) = setup().await;
    let u = users.create(user("hank")).await.unwrap();

    changes
        .create(change(u.id, ProfileField::Phone, "555-0101"))
        .await
        .unwrap();
    let err = changes
        .create(change(u.id, ProfileField::Phone, "555-0102"))
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }), "{err:?}");

    // A different field is independent.
    changes
        .create(change(u.id, ProfileField::FullName, "Henry"))
        .await
        .unwrap();
    assert_eq!(changes.list_for_user(u.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn rejection_leaves_user_untouched() {
    let (users, changes) = setup().await;
    let u = users.create(user("ivy")).await.unwrap();
    let req = changes
        .create(change(u.id, ProfileField::Email, "ivy@new.example.com"))
        .await
        .unwrap();

    let rejected = changes
        .reject(req.id, Uuid::new_v4(), Some("Use a work address".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, ProfileChangeStatus::Rejected);
    assert_eq!(users.get_by_id(u.id).await.unwrap().email, "ivy@example.com");

    assert!(
        changes
            .list(Some(ProfileChangeStatus::Pending))
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(changes.list(None).await.unwrap().len(), 1);

    // Rejected requests do not block a new one.
    changes
        .create(change(u.id, ProfileField::Email, "ivy@work.example.com"))
        .await
        .unwrap();
}

#[tokio::test]
async fn approving_taken_email_is_rejected() {
    let (users, changes) = setup().await;
    let a = users.create(user("jack")).await.unwrap();
    users.create(user("kate")).await.unwrap();

    let req = changes
        .create(change(a.id, ProfileField::Email, "kate@example.com"))
        .await
        .unwrap();
    let err = changes
        .approve(req.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }), "{err:?}");

    let reloaded = changes.get_by_id(req.id).await.unwrap();
    assert_eq!(reloaded.status, ProfileChangeStatus::Pending);
    assert_eq!(users.get_by_id(a.id).await.unwrap().email, "jack@example.com");
}
