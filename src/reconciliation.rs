// ⚖️ Reconciliation Engine - current snapshot vs stored applications
//
// For each resolved row:
//   absent   → create
//   archived → reactivate + apply values
//   active   → apply values (skipped when nothing changed)
// Then every application that was active BEFORE this run and whose
// (student, college) was not seen in this run gets archived.
//
// The "before" set is read once, up front. Applications created by this
// run can never show up in it, so they can never be archived by it.

use crate::db::Event;
use crate::entities::{ApplicationAttributes, CollegeApplication, Tenant};
use crate::error::Result;
use crate::resolver::ResolvedRow;
use crate::store::ApplicationStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_ACTOR: &str = "csv_importer";
const ENTITY_TYPE: &str = "college_application";

// ============================================================================
// CHANGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationChange {
    Created,
    Updated,
    Unchanged,
    Reactivated,
    Archived,
}

impl ApplicationChange {
    pub fn event_type(&self) -> &'static str {
        match self {
            ApplicationChange::Created => "application_created",
            ApplicationChange::Updated => "application_updated",
            ApplicationChange::Unchanged => "application_unchanged",
            ApplicationChange::Reactivated => "application_reactivated",
            ApplicationChange::Archived => "application_archived",
        }
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub reactivated: usize,
    pub archived: usize,

    /// Ids archived by this run
    pub archived_ids: Vec<i64>,
}

impl ReconciliationReport {
    fn record(&mut self, change: ApplicationChange) {
        match change {
            ApplicationChange::Created => self.created += 1,
            ApplicationChange::Updated => self.updated += 1,
            ApplicationChange::Unchanged => self.unchanged += 1,
            ApplicationChange::Reactivated => self.reactivated += 1,
            ApplicationChange::Archived => self.archived += 1,
        }
    }

    /// Writes performed (unchanged rows are not written)
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.reactivated + self.archived
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Recorded as the actor of every audit event
    pub actor: String,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    /// Apply one run's deduplicated, resolved rows to the store.
    ///
    /// `now` is used for every timestamp written by this run.
    pub fn reconcile<S: ApplicationStore>(
        &self,
        store: &S,
        tenant: &Tenant,
        rows: &[ResolvedRow],
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport> {
        let previously_active = store.list_active_applications(tenant)?;
        tracing::debug!(
            count = previously_active.len(),
            tenant = %tenant.name,
            "snapshot of active applications taken"
        );

        let mut report = ReconciliationReport::default();
        let mut seen: HashSet<(i64, i64)> = HashSet::with_capacity(rows.len());

        // Phase 1: create / update / reactivate
        for resolved in rows {
            let pair = (resolved.student.id, resolved.college.id);
            if !seen.insert(pair) {
                tracing::warn!(
                    line = resolved.row.line,
                    "row resolves to an application already handled in this run"
                );
            }

            let attrs = ApplicationAttributes::from(&resolved.row);
            let existing = store.find_application(&resolved.student, &resolved.college)?;

            let change = match &existing {
                None => ApplicationChange::Created,
                Some(app) if app.is_archived => ApplicationChange::Reactivated,
                Some(app) if app.attributes == attrs => ApplicationChange::Unchanged,
                Some(_) => ApplicationChange::Updated,
            };

            if change != ApplicationChange::Unchanged {
                let application =
                    store.upsert_application(&resolved.student, &resolved.college, &attrs, now)?;
                self.log_change(store, change, &application, existing.as_ref(), now)?;
            }

            report.record(change);
        }

        // Phase 2: archive everything from the snapshot this run did not see
        for application in previously_active
            .iter()
            .filter(|app| !seen.contains(&app.pair()))
        {
            store.archive_application(application, now)?;
            self.log_change(store, ApplicationChange::Archived, application, None, now)?;

            report.archived_ids.push(application.id);
            report.record(ApplicationChange::Archived);
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            reactivated = report.reactivated,
            archived = report.archived,
            "reconciliation complete"
        );

        Ok(report)
    }

    fn log_change<S: ApplicationStore>(
        &self,
        store: &S,
        change: ApplicationChange,
        application: &CollegeApplication,
        previous: Option<&CollegeApplication>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        tracing::debug!(
            application_id = application.id,
            change = change.event_type(),
            "application written"
        );

        let data = serde_json::json!({
            "student_id": application.student_id,
            "college_id": application.college_id,
            "attributes": application.attributes,
            "previous": previous.map(|p| &p.attributes),
        });

        let event = Event::new(
            change.event_type(),
            ENTITY_TYPE,
            &application.id.to_string(),
            data,
            &self.actor,
        )
        .at(now);

        store.record_event(&event)
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
