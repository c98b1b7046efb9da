//! Admin dashboard rollups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invoice::StatusCount;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorWorkload {
    pub instructor_id: Uuid,
    pub full_name: String,
    pub confirmed_courses: u64,
    pub completed_courses: u64,
    pub approved_hours: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub courses_by_status: Vec<StatusCount>,
    pub billing_queue_size: u64,
    pub instructor_workload: Vec<InstructorWorkload>,
}
