//! Student attendance as reported by the backend
//!
//! The service only knows the two percentages; the student's name comes from
//! local configuration. Records are fetched on view entry and never cached.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::announcements::error::{AnnouncementError, AnnouncementResult};

/// Raw `/faltas` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceFigures {
    #[serde(rename = "faltas")]
    pub absence_percent: f64,
    #[serde(rename = "limite")]
    pub absence_limit_percent: f64,
}

impl AttendanceFigures {
    /// Attach the student's name, rejecting percentages outside 0-100
    pub fn into_record(self, student_name: impl Into<String>) -> AnnouncementResult<AttendanceRecord> {
        for (name, value) in [
            ("faltas", self.absence_percent),
            ("limite", self.absence_limit_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AnnouncementError::invalid_response(format!(
                    "{} out of range: {}",
                    name, value
                )));
            }
        }

        Ok(AttendanceRecord {
            student_name: student_name.into(),
            absence_percent: self.absence_percent,
            absence_limit_percent: self.absence_limit_percent,
        })
    }
}

/// A student's absences against the course limit, both in percent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub student_name: String,
    pub absence_percent: f64,
    pub absence_limit_percent: f64,
}

impl AttendanceRecord {
    /// Absences past the limit
    pub fn is_at_risk(&self) -> bool {
        self.absence_percent > self.absence_limit_percent
    }

    /// Absences at or above 90% of the limit
    pub fn is_near_limit(&self) -> bool {
        self.absence_percent >= self.absence_limit_percent * 0.9
    }

    /// Headroom left before the limit, never negative
    pub fn remaining_percent(&self) -> f64 {
        (self.absence_limit_percent - self.absence_percent).max(0.0)
    }
}

impl fmt::Display for AttendanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Absences: {}% of {}% (limit)",
            self.absence_percent, self.absence_limit_percent
        )
    }
}
