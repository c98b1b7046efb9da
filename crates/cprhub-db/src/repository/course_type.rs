//! SurrealDB implementation of [`CourseTypeRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::course_type::{CourseType, CreateCourseType, UpdateCourseType};
use cprhub_core::repository::CourseTypeRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{not_found, parse_uuid, write_error};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CourseTypeRow {
    record_id: String,
    name: String,
    description: String,
    duration_minutes: u32,
    price_per_student_cents: i64,
    max_students: u32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CourseTypeRow {
    fn try_into_course_type(self) -> Result<CourseType, DbError> {
        Ok(CourseType {
            id: parse_uuid("course type", &self.record_id)?,
            name: self.name,
            description: self.description,
            duration_minutes: self.duration_minutes,
            price_per_student_cents: self.price_per_student_cents,
            max_students: self.max_students,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the course catalogue.
#[derive(Clone)]
pub struct SurrealCourseTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCourseTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<CourseType, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('course_type', $id)",
            )
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CourseTypeRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("course type", id))?
            .try_into_course_type()
    }
}

impl<C: Connection> CourseTypeRepository for SurrealCourseTypeRepository<C> {
    async fn create(&self, input: CreateCourseType) -> CprResult<CourseType> {
        let id = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('course_type', $id) SET \
                 name = $name, description = $description, \
                 duration_minutes = $duration_minutes, \
                 price_per_student_cents = $price_per_student_cents, \
                 max_students = $max_students, active = true",
            )
            .bind(("id", id.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("duration_minutes", input.duration_minutes))
            .bind(("price_per_student_cents", input.price_per_student_cents))
            .bind(("max_students", input.max_students))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("course type", e))?;

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<CourseType> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn update(&self, id: Uuid, input: UpdateCourseType) -> CprResult<CourseType> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.duration_minutes.is_some() {
            sets.push("duration_minutes = $duration_minutes");
        }
        if input.price_per_student_cents.is_some() {
            sets.push("price_per_student_cents = $price_per_student_cents");
        }
        if input.max_students.is_some() {
            sets.push("max_students = $max_students");
        }
        if input.active.is_some() {
            sets.push("active = $active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('course_type', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(duration_minutes) = input.duration_minutes {
            builder = builder.bind(("duration_minutes", duration_minutes));
        }
        if let Some(price) = input.price_per_student_cents {
            builder = builder.bind(("price_per_student_cents", price));
        }
        if let Some(max_students) = input.max_students {
            builder = builder.bind(("max_students", max_students));
        }
        if let Some(active) = input.active {
            builder = builder.bind(("active", active));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("course type", e))?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(not_found("course type", id).into());
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn list(&self, active_only: bool) -> CprResult<Vec<CourseType>> {
        let query = if active_only {
            "SELECT meta::id(id) AS record_id, * FROM course_type \
             WHERE active = true ORDER BY name ASC"
        } else {
            "SELECT meta::id(id) AS record_id, * FROM course_type ORDER BY name ASC"
        };
        let mut result = self.db.query(query).await.map_err(DbError::from)?;
        let rows: Vec<CourseTypeRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_course_type())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
