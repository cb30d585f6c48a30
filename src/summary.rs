// 📊 Run Summary - what one import did
//
// A run either completes with a summary or fails fast with one cause.
// For the missing-columns failure the summary still exists: all counts are
// zero and the failure names the columns.

use crate::deduplication::DeduplicatedRows;
use crate::error::ImportError;
use crate::normalizer::{NormalizationOutcome, RowAnomaly};
use crate::reconciliation::ReconciliationReport;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    MissingColumns { missing: Vec<String> },
    Other { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tenant: String,
    pub source_file: String,

    // Input
    pub rows_read: usize,
    pub skipped: usize,
    pub duplicates_collapsed: usize,
    pub total_processed: usize,

    // Identities
    pub students_created: usize,
    pub colleges_created: usize,

    // Applications
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub reactivated: usize,
    pub archived: usize,

    pub anomalies: Vec<RowAnomaly>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,

    /// True when the run was rolled back on purpose
    pub dry_run: bool,
}

/// "outer: cause: root cause", one line
fn error_chain(error: &ImportError) -> String {
    let mut message = error.to_string();
    let mut cause = std::error::Error::source(error);
    while let Some(err) = cause {
        message.push_str(": ");
        message.push_str(&err.to_string());
        cause = err.source();
    }
    message
}

impl RunSummary {
    pub fn new(tenant: &str, source_file: &str) -> Self {
        RunSummary {
            tenant: tenant.to_string(),
            source_file: source_file.to_string(),
            ..Default::default()
        }
    }

    /// Summary of a run that failed before any mutation
    pub fn failed(tenant: &str, source_file: &str, error: &ImportError) -> Self {
        let failure = match error {
            ImportError::MissingColumns { missing, .. } => RunFailure::MissingColumns {
                missing: missing.clone(),
            },
            other => RunFailure::Other {
                message: error_chain(other),
            },
        };

        RunSummary {
            failure: Some(failure),
            ..RunSummary::new(tenant, source_file)
        }
    }

    pub fn record_normalization(&mut self, rows_read: usize, outcome: &NormalizationOutcome) {
        self.rows_read = rows_read;
        self.skipped = outcome.skipped();
        self.anomalies = outcome.anomalies.clone();
    }

    pub fn record_deduplication(&mut self, deduped: &DeduplicatedRows) {
        self.duplicates_collapsed = deduped.collapsed;
        self.total_processed = deduped.len();
    }

    pub fn record_resolution(&mut self, students_created: usize, colleges_created: usize) {
        self.students_created = students_created;
        self.colleges_created = colleges_created;
    }

    pub fn record_reconciliation(&mut self, report: &ReconciliationReport) {
        self.created = report.created;
        self.updated = report.updated;
        self.unchanged = report.unchanged;
        self.reactivated = report.reactivated;
        self.archived = report.archived;
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import summary for {} ({})", self.source_file, self.tenant)?;
        if self.dry_run {
            writeln!(f, "  (dry run - nothing was committed)")?;
        }

        if let Some(failure) = &self.failure {
            return match failure {
                RunFailure::MissingColumns { missing } => {
                    writeln!(f, "  FAILED: missing required columns: {}", missing.join(", "))
                }
                RunFailure::Other { message } => writeln!(f, "  FAILED: {}", message),
            };
        }

        writeln!(f, "  rows read:            {}", self.rows_read)?;
        writeln!(f, "  skipped:              {}", self.skipped)?;
        writeln!(f, "  duplicates collapsed: {}", self.duplicates_collapsed)?;
        writeln!(f, "  processed:            {}", self.total_processed)?;
        writeln!(f, "  students created:     {}", self.students_created)?;
        writeln!(f, "  colleges created:     {}", self.colleges_created)?;
        writeln!(f, "  created:              {}", self.created)?;
        writeln!(f, "  updated:              {}", self.updated)?;
        writeln!(f, "  unchanged:            {}", self.unchanged)?;
        writeln!(f, "  reactivated:          {}", self.reactivated)?;
        writeln!(f, "  archived:             {}", self.archived)?;
        writeln!(f, "  anomalies:            {}", self.anomaly_count())?;

        for anomaly in &self.anomalies {
            writeln!(f, "    - {}", anomaly)?;
        }

        Ok(())
    }
}
