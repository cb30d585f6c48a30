// 📨 CollegeApplication - one record per (Student, College)
//
// Lifecycle: created → updated in place → archived (soft) → reactivated.
// Never physically deleted.

use crate::normalizer::{Attending, NormalizedRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The values a CSV row carries for an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAttributes {
    pub application_result: Option<String>,
    pub application_type: Option<String>,
    pub attending: Attending,
}

impl From<&NormalizedRow> for ApplicationAttributes {
    fn from(row: &NormalizedRow) -> Self {
        ApplicationAttributes {
            application_result: row.application_result.clone(),
            application_type: row.application_type.clone(),
            attending: row.attending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollegeApplication {
    pub id: i64,
    pub student_id: i64,
    pub college_id: i64,
    pub attributes: ApplicationAttributes,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollegeApplication {
    /// (student_id, college_id): the stored form of a MatchKey
    pub fn pair(&self) -> (i64, i64) {
        (self.student_id, self.college_id)
    }

    pub fn is_active(&self) -> bool {
        !self.is_archived
    }
}
