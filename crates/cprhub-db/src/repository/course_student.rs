//! SurrealDB implementation of [`CourseStudentRepository`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::course_student::{CourseStudent, NewStudent, normalize_email};
use cprhub_core::repository::CourseStudentRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::support::{not_found, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CourseStudentRow {
    record_id: String,
    course_request_id: String,
    first_name: String,
    last_name: String,
    email: String,
    attended: Option<bool>,
    attendance_marked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl CourseStudentRow {
    fn try_into_student(self) -> Result<CourseStudent, DbError> {
        Ok(CourseStudent {
            id: parse_uuid("course student", &self.record_id)?,
            course_request_id: parse_uuid("course request", &self.course_request_id)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            attended: self.attended,
            attendance_marked_at: self.attendance_marked_at,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of course rosters.
#[derive(Clone)]
pub struct SurrealCourseStudentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCourseStudentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn enrolled_emails(&self, course: &str) -> Result<HashSet<String>, DbError> {
        let mut result = self
            .db
            .query("SELECT VALUE email FROM course_student WHERE course_request_id = $course")
            .bind(("course", course.to_string()))
            .await?;
        let emails: Vec<String> = result.take(0)?;
        Ok(emails.into_iter().collect())
    }
}

impl<C: Connection> CourseStudentRepository for SurrealCourseStudentRepository<C> {
    async fn add_many(
        &self,
        course_request_id: Uuid,
        students: Vec<NewStudent>,
    ) -> CprResult<Vec<CourseStudent>> {
        if students.is_empty() {
            return Ok(Vec::new());
        }
        let course = course_request_id.to_string();

        let mut seen = HashSet::new();
        for student in &students {
            if !seen.insert(normalize_email(&student.email)) {
                return Err(DbError::Duplicate {
                    entity: format!("course student {}", student.email.trim()),
                }
                .into());
            }
        }

        let mut statements = vec!["BEGIN TRANSACTION;".to_string()];
        for i in 0..students.len() {
            statements.push(format!(
                "CREATE type::record('course_student', $id{i}) SET \
                 course_request_id = $course, first_name = $first{i}, \
                 last_name = $last{i}, email = $email{i};"
            ));
        }
        statements.push("COMMIT TRANSACTION;".to_string());
        let query = statements.join(" ");

        let mut ids = Vec::with_capacity(students.len());
        let mut builder = self.db.query(&query).bind(("course", course.clone()));
        for (i, student) in students.into_iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            builder = builder
                .bind((format!("id{i}"), id.clone()))
                .bind((format!("first{i}"), student.first_name.trim().to_string()))
                .bind((format!("last{i}"), student.last_name.trim().to_string()))
                .bind((format!("email{i}"), normalize_email(&student.email)));
            ids.push(id);
        }

        if let Err(e) = builder.await.map_err(DbError::from)?.check() {
            debug!(course_request_id = %course_request_id, error = %e, "Roster insert rolled back");
            let enrolled = self.enrolled_emails(&course).await?;
            if let Some(email) = seen.iter().find(|email| enrolled.contains(*email)) {
                return Err(DbError::Duplicate {
                    entity: format!("course student {email}"),
                }
                .into());
            }
            return Err(DbError::Query(e.to_string()).into());
        }

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM course_student \
                 WHERE course_request_id = $course AND meta::id(id) IN $ids \
                 ORDER BY last_name ASC, first_name ASC",
            )
            .bind(("course", course))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CourseStudentRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_student())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn get_by_id(&self, course_request_id: Uuid, id: Uuid) -> CprResult<CourseStudent> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('course_student', $id) \
                 WHERE course_request_id = $course",
            )
            .bind(("id", id.to_string()))
            .bind(("course", course_request_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CourseStudentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found("course student", id))?;
        Ok(row.try_into_student()?)
    }

    async fn list(&self, course_request_id: Uuid) -> CprResult<Vec<CourseStudent>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM course_student \
                 WHERE course_request_id = $course \
                 ORDER BY last_name ASC, first_name ASC",
            )
            .bind(("course", course_request_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CourseStudentRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_student())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn mark_attendance(
        &self,
        course_request_id: Uuid,
        id: Uuid,
        attended: bool,
    ) -> CprResult<CourseStudent> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('course_student', $id) SET \
                 attended = $attended, attendance_marked_at = time::now() \
                 WHERE course_request_id = $course",
            )
            .bind(("id", id.to_string()))
            .bind(("course", course_request_id.to_string()))
            .bind(("attended", attended))
            .await
            .map_err(DbError::from)?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(not_found("course student", id).into());
        }
        self.get_by_id(course_request_id, id).await
    }

    async fn remove(&self, course_request_id: Uuid, id: Uuid) -> CprResult<()> {
        let mut result = self
            .db
            .query(
                "DELETE type::record('course_student', $id) \
                 WHERE course_request_id = $course RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("course", course_request_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let removed: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(not_found("course student", id).into());
        }
        Ok(())
    }
}
