//! Course catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseType {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_minutes: u32,
    /// Price billed to the organization per attending student.
    pub price_per_student_cents: i64,
    pub max_students: u32,
    /// Inactive types stay referenced by historical courses but cannot
    /// be booked.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: u32,
    pub price_per_student_cents: i64,
    pub max_students: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateCourseType {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub price_per_student_cents: Option<i64>,
    pub max_students: Option<u32>,
    pub active: Option<bool>,
}
