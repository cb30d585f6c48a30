// 🧭 Entity Resolver - NormalizedRow → (Student, College)
//
// Students: find-or-create by (tenant, student_number).
// Colleges: two explicit strategies, picked per row:
//   ByCode - exact ceeb_code (opaque string)
//   ByName - case-insensitive name, among colleges without a code

use crate::deduplication::CollegeIdentity;
use crate::entities::{College, Student, Tenant};
use crate::error::Result;
use crate::normalizer::NormalizedRow;
use crate::store::ApplicationStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// COLLEGE LOOKUP STRATEGY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollegeLookup {
    /// `name` is only used as the display name if the college is new
    ByCode { ceeb_code: String, name: String },
    ByName { name: String },
}

impl CollegeLookup {
    /// ceeb_code when present, name otherwise
    pub fn from_row(row: &NormalizedRow) -> Self {
        if row.has_ceeb_code() {
            CollegeLookup::ByCode {
                ceeb_code: row.ceeb_code.clone(),
                name: row.college_name.clone(),
            }
        } else {
            CollegeLookup::ByName {
                name: row.college_name.clone(),
            }
        }
    }

    /// The key this lookup matches on (same key the deduplicator uses)
    pub fn identity(&self) -> CollegeIdentity {
        match self {
            CollegeLookup::ByCode { ceeb_code, .. } => CollegeIdentity::Code(ceeb_code.clone()),
            CollegeLookup::ByName { name } => CollegeIdentity::Name(College::name_key(name)),
        }
    }
}

// ============================================================================
// RESOLVED ROW
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub row: NormalizedRow,
    pub student: Student,
    pub college: College,
}

// ============================================================================
// ENTITY RESOLVER
// ============================================================================

/// Resolves rows for one run against one tenant.
///
/// Identities are cached for the lifetime of the resolver, so every row of
/// a run sees the same Student/College for the same key.
pub struct EntityResolver<'s, S: ApplicationStore> {
    store: &'s S,
    tenant: Tenant,
    students: HashMap<String, Student>,
    colleges: HashMap<CollegeIdentity, College>,

    pub students_created: usize,
    pub colleges_created: usize,
}

impl<'s, S: ApplicationStore> EntityResolver<'s, S> {
    pub fn new(store: &'s S, tenant: Tenant) -> Self {
        EntityResolver {
            store,
            tenant,
            students: HashMap::new(),
            colleges: HashMap::new(),
            students_created: 0,
            colleges_created: 0,
        }
    }

    pub fn resolve_student(&mut self, student_number: &str) -> Result<Student> {
        if let Some(student) = self.students.get(student_number) {
            return Ok(student.clone());
        }

        let resolved = self.store.find_or_create_student(student_number, &self.tenant)?;
        if resolved.created {
            self.students_created += 1;
        }

        self.students
            .insert(student_number.to_string(), resolved.entity.clone());
        Ok(resolved.entity)
    }

    pub fn resolve_college(&mut self, lookup: &CollegeLookup) -> Result<College> {
        let identity = lookup.identity();
        if let Some(college) = self.colleges.get(&identity) {
            return Ok(college.clone());
        }

        let resolved = self.store.find_or_create_college(lookup)?;
        if resolved.created {
            self.colleges_created += 1;
        }

        self.colleges.insert(identity, resolved.entity.clone());
        Ok(resolved.entity)
    }

    pub fn resolve(&mut self, row: NormalizedRow) -> Result<ResolvedRow> {
        let student = self.resolve_student(&row.student_number)?;
        let college = self.resolve_college(&CollegeLookup::from_row(&row))?;

        Ok(ResolvedRow { row, student, college })
    }

    /// Resolve every row, stopping at the first storage failure
    pub fn resolve_all(&mut self, rows: Vec<NormalizedRow>) -> Result<Vec<ResolvedRow>> {
        rows.into_iter().map(|row| self.resolve(row)).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
