// 🗄️ Storage seam - what the resolver and reconciler need from a store
//
// The reconciler never talks SQL. It talks to this trait, so the
// create/update/archive algorithm can run against any store that offers
// find-by-key, upsert and list-existing.

use crate::db::Event;
use crate::entities::{ApplicationAttributes, College, CollegeApplication, Student, Tenant};
use crate::error::Result;
use crate::resolver::CollegeLookup;
use chrono::{DateTime, Utc};

/// An entity plus whether this call created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub entity: T,
    pub created: bool,
}

impl<T> Resolved<T> {
    pub fn found(entity: T) -> Self {
        Resolved { entity, created: false }
    }

    pub fn created(entity: T) -> Self {
        Resolved { entity, created: true }
    }
}

pub trait ApplicationStore {
    /// Find the tenant by name, creating it on first use
    fn find_or_create_tenant(&self, name: &str) -> Result<Resolved<Tenant>>;

    /// Find the student by (tenant, student_number), creating it on first sighting
    fn find_or_create_student(&self, student_number: &str, tenant: &Tenant) -> Result<Resolved<Student>>;

    /// Find the college through the given lookup strategy, creating it on first sighting
    fn find_or_create_college(&self, lookup: &CollegeLookup) -> Result<Resolved<College>>;

    /// Application for the pair, archived or not
    fn find_application(&self, student: &Student, college: &College) -> Result<Option<CollegeApplication>>;

    /// Insert or overwrite the pair's application with `attrs`.
    /// Always leaves the application active (archive fields cleared).
    fn upsert_application(
        &self,
        student: &Student,
        college: &College,
        attrs: &ApplicationAttributes,
        at: DateTime<Utc>,
    ) -> Result<CollegeApplication>;

    /// Every non-archived application of the tenant's students
    fn list_active_applications(&self, tenant: &Tenant) -> Result<Vec<CollegeApplication>>;

    /// Soft-delete: is_archived = true, archived_at = at
    fn archive_application(&self, application: &CollegeApplication, at: DateTime<Utc>) -> Result<()>;

    /// Append to the audit trail
    fn record_event(&self, event: &Event) -> Result<()>;
}
