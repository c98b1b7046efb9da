//! Integration tests for the course catalogue, course requests,
//! rosters and instructor availability.

use chrono::NaiveDate;
use cprhub_core::error::CprError;
use cprhub_core::models::course_request::{CourseRequestFilter, CourseStatus, CreateCourseRequest};
use cprhub_core::models::course_student::NewStudent;
use cprhub_core::models::course_type::{CreateCourseType, UpdateCourseType};
use cprhub_core::repository::{
    AvailabilityRepository, CourseRequestRepository, CourseStudentRepository,
    CourseTypeRepository, Pagination,
};
use cprhub_db::repository::{
    SurrealAvailabilityRepository, SurrealCourseRequestRepository,
    SurrealCourseStudentRepository, SurrealCourseTypeRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Fixture {
    types: SurrealCourseTypeRepository<Db>,
    courses: SurrealCourseRequestRepository<Db>,
    students: SurrealCourseStudentRepository<Db>,
    availability: SurrealAvailabilityRepository<Db>,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cprhub_db::run_migrations(&db).await.unwrap();
    Fixture {
        types: SurrealCourseTypeRepository::new(db.clone()),
        courses: SurrealCourseRequestRepository::new(db.clone()),
        students: SurrealCourseStudentRepository::new(db.clone()),
        availability: SurrealAvailabilityRepository::new(db),
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
}

fn request(organization_id: Uuid, course_type_id: Uuid, date: NaiveDate) -> CreateCourseRequest {
    CreateCourseRequest {
        organization_id,
        course_type_id,
        location: "Head office, room 2".into(),
        scheduled_date: date,
        expected_students: 8,
        notes: None,
    }
}

fn student(first: &str, email: &str) -> NewStudent {
    NewStudent {
        first_name: first.into(),
        last_name: "Learner".into(),
        email: email.into(),
    }
}

#[tokio::test]
async fn course_types_list_and_deactivate() {
    let f = setup().await;
    let cpr = f
        .types
        .create(CreateCourseType {
            name: "CPR Level C".into(),
            description: "Adult, child and infant CPR".into(),
            duration_minutes: 240,
            price_per_student_cents: 8_500,
            max_students: 12,
        })
        .await
        .unwrap();
    f.types
        .create(CreateCourseType {
            name: "AED Refresher".into(),
            description: String::new(),
            duration_minutes: 90,
            price_per_student_cents: 4_000,
            max_students: 20,
        })
        .await
        .unwrap();

    f.types
        .update(
            cpr.id,
            UpdateCourseType {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(f.types.list(false).await.unwrap().len(), 2);
    let active = f.types.list(true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "AED Refresher");
}

#[tokio::test]
async fn confirm_consumes_availability() {
    let f = setup().await;
    let instructor = Uuid::new_v4();
    let course = f
        .courses
        .create(request(Uuid::new_v4(), Uuid::new_v4(), day(3)))
        .await
        .unwrap();
    assert_eq!(course.status, CourseStatus::Pending);

    f.availability.add(instructor, day(3)).await.unwrap();
    assert_eq!(
        f.availability.instructors_available_on(day(3)).await.unwrap(),
        vec![instructor]
    );

    let confirmed = f
        .courses
        .confirm(course.id, CourseStatus::Pending, instructor)
        .await
        .unwrap();
    assert_eq!(confirmed.status, CourseStatus::Confirmed);
    assert_eq!(confirmed.instructor_id, Some(instructor));
    assert!(confirmed.confirmed_at.is_some());
    assert!(!f.availability.is_available(instructor, day(3)).await.unwrap());
}

#[tokio::test]
async fn reassign_returns_date_to_previous_instructor() {
    let f = setup().await;
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let course = f
        .courses
        .create(request(Uuid::new_v4(), Uuid::new_v4(), day(6)))
        .await
        .unwrap();
    f.availability.add(first, day(6)).await.unwrap();
    f.availability.add(second, day(6)).await.unwrap();

    f.courses
        .confirm(course.id, CourseStatus::Pending, first)
        .await
        .unwrap();
    let reassigned = f
        .courses
        .confirm(course.id, CourseStatus::Confirmed, second)
        .await
        .unwrap();
    assert_eq!(reassigned.status, CourseStatus::Confirmed);
    assert_eq!(reassigned.instructor_id, Some(second));
    assert!(f.availability.is_available(first, day(6)).await.unwrap());
    assert!(!f.availability.is_available(second, day(6)).await.unwrap());

    // A failed reassignment leaves the current instructor in place.
    let err = f
        .courses
        .confirm(course.id, CourseStatus::Confirmed, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)), "{err:?}");
    assert_eq!(
        f.courses.get_by_id(course.id).await.unwrap().instructor_id,
        Some(second)
    );
    assert!(!f.availability.is_available(second, day(6)).await.unwrap());
}

#[tokio::test]
async fn cancelling_confirmed_course_frees_instructor() {
    let f = setup().await;
    let instructor = Uuid::new_v4();
    let course = f
        .courses
        .create(request(Uuid::new_v4(), Uuid::new_v4(), day(7)))
        .await
        .unwrap();
    f.availability.add(instructor, day(7)).await.unwrap();
    f.courses
        .confirm(course.id, CourseStatus::Pending, instructor)
        .await
        .unwrap();

    let cancelled = f
        .courses
        .cancel(course.id, CourseStatus::Confirmed, Some("Site closed".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, CourseStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Site closed"));
    assert_eq!(
        f.availability.instructors_available_on(day(7)).await.unwrap(),
        vec![instructor]
    );

    assert!(matches!(
        f.courses
            .cancel(course.id, CourseStatus::Confirmed, None)
            .await
            .unwrap_err(),
        CprError::Conflict(_)
    ));
}

#[tokio::test]
async fn confirm_without_availability_rolls_back() {
    let f = setup().await;
    let course = f
        .courses
        .create(request(Uuid::new_v4(), Uuid::new_v4(), day(4)))
        .await
        .unwrap();

    let err = f
        .courses
        .confirm(course.id, CourseStatus::Pending, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)), "{err:?}");

    let reloaded = f.courses.get_by_id(course.id).await.unwrap();
    assert_eq!(reloaded.status, CourseStatus::Pending);
    assert!(reloaded.instructor_id.is_none());
}

#[tokio::test]
async fn stale_status_is_a_conflict() {
    let f = setup().await;
    let course = f
        .courses
        .create(request(Uuid::new_v4(), Uuid::new_v4(), day(5)))
        .await
        .unwrap();

    f.courses
        .cancel(course.id, CourseStatus::Pending, Some("Rescheduled".into()))
        .await
        .unwrap();

    let err = f
        .courses
        .cancel(course.id, CourseStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)));

    let err = f.courses.complete(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CprError::NotFound { .. }));
}

#[tokio::test]
async fn completed_course_enters_billing_queue_once_released() {
    let f = setup().await;
    let instructor = Uuid::new_v4();
    let course = f
        .courses
        .create(request(Uuid::new_v4(), Uuid::new_v4(), day(6)))
        .await
        .unwrap();
    f.availability.add(instructor, day(6)).await.unwrap();
    f.courses
        .confirm(course.id, CourseStatus::Pending, instructor)
        .await
        .unwrap();

    let done = f.courses.complete(course.id).await.unwrap();
    assert_eq!(done.status, CourseStatus::Completed);
    assert!(f.courses.billing_queue().await.unwrap().is_empty());

    let released = f.courses.mark_ready_for_billing(course.id).await.unwrap();
    assert!(released.in_billing_queue());
    let queue = f.courses.billing_queue().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, course.id);

    let err = f.courses.mark_ready_for_billing(course.id).await.unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)));

    let by_instructor = f
        .courses
        .count_by_instructor(CourseStatus::Completed)
        .await
        .unwrap();
    assert_eq!(by_instructor, vec![(instructor, 1)]);
}

#[tokio::test]
async fn list_filters_and_counts_by_status() {
    let f = setup().await;
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();
    let course_type = Uuid::new_v4();
    let first = f
        .courses
        .create(request(org_a, course_type, day(7)))
        .await
        .unwrap();
    f.courses
        .create(request(org_a, course_type, day(8)))
        .await
        .unwrap();
    f.courses
        .create(request(org_b, course_type, day(9)))
        .await
        .unwrap();
    f.courses
        .cancel(first.id, CourseStatus::Pending, None)
        .await
        .unwrap();

    let page = f
        .courses
        .list(
            CourseRequestFilter {
                organization_id: Some(org_a),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    // Latest scheduled date first.
    assert_eq!(page.items[0].scheduled_date, day(8));

    let mut counts = f.courses.count_by_status().await.unwrap();
    counts.sort_by(|a, b| a.status.cmp(&b.status));
    let pairs: Vec<_> = counts.iter().map(|c| (c.status.as_str(), c.count)).collect();
    assert_eq!(pairs, vec![("cancelled", 1), ("pending", 2)]);
}

#[tokio::test]
async fn roster_batch_is_atomic_and_emails_unique() {
    let f = setup().await;
    let course = Uuid::new_v4();

    let added = f
        .students
        .add_many(
            course,
            vec![
                student("Ada", "ADA@example.com "),
                student("Bo", "bo@example.com"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(added.len(), 2);
    assert!(added.iter().any(|s| s.email == "ada@example.com"));

    let err = f
        .students
        .add_many(
            course,
            vec![student("Cy", "cy@example.com"), student("Ada", "ada@example.com")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }), "{err:?}");
    assert_eq!(f.students.list(course).await.unwrap().len(), 2);

    let err = f
        .students
        .add_many(
            course,
            vec![student("Di", "di@example.com"), student("Di", "DI@example.com")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }));

    // Same email is fine on a different course.
    f.students
        .add_many(Uuid::new_v4(), vec![student("Ada", "ada@example.com")])
        .await
        .unwrap();
}

#[tokio::test]
async fn attendance_and_removal_are_scoped_to_course() {
    let f = setup().await;
    let course = Uuid::new_v4();
    let added = f
        .students
        .add_many(course, vec![student("Eve", "eve@example.com")])
        .await
        .unwrap();
    let eve = &added[0];
    assert!(eve.attended.is_none());

    let marked = f
        .students
        .mark_attendance(course, eve.id, true)
        .await
        .unwrap();
    assert_eq!(marked.attended, Some(true));
    assert!(marked.attendance_marked_at.is_some());

    let err = f
        .students
        .mark_attendance(Uuid::new_v4(), eve.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::NotFound { .. }));

    f.students.remove(course, eve.id).await.unwrap();
    assert!(f.students.list(course).await.unwrap().is_empty());
    assert!(matches!(
        f.students.remove(course, eve.id).await.unwrap_err(),
        CprError::NotFound { .. }
    ));
}

#[tokio::test]
async fn availability_lists_upcoming_dates_only() {
    let f = setup().await;
    let instructor = Uuid::new_v4();
    for d in [12, 2, 20] {
        f.availability.add(instructor, day(d)).await.unwrap();
    }
    let err = f.availability.add(instructor, day(12)).await.unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }));

    let upcoming = f
        .availability
        .list_for_instructor(instructor, day(10))
        .await
        .unwrap();
    let dates: Vec<_> = upcoming.iter().map(|a| a.date).collect();
    assert_eq!(dates, vec![day(12), day(20)]);

    f.availability.remove(instructor, day(12)).await.unwrap();
    assert!(!f.availability.is_available(instructor, day(12)).await.unwrap());
    assert!(matches!(
        f.availability.remove(instructor, day(12)).await.unwrap_err(),
        CprError::NotFound { .. }
    ));
}
