//! Instructor availability.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A date on which an instructor can be booked. Consumed when a
/// course on that date is confirmed for the instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorAvailability {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
