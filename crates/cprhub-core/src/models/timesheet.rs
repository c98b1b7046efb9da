//! Instructor timesheets.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum TimesheetStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

/// Weekly hours claimed by an instructor. One per instructor per week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: Uuid,
    pub instructor_id: Uuid,
    /// Always a Monday.
    pub week_start_date: NaiveDate,
    pub hours: f64,
    pub courses_taught: u32,
    pub notes: Option<String>,
    pub status: TimesheetStatus,
    pub review_comment: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimesheet {
    pub instructor_id: Uuid,
    pub week_start_date: NaiveDate,
    pub hours: f64,
    pub courses_taught: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTimesheet {
    pub hours: Option<f64>,
    pub courses_taught: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TimesheetFilter {
    pub instructor_id: Option<Uuid>,
    pub status: Option<TimesheetStatus>,
}
