// 🚚 Importer - one CSV file → one reconciliation run
//
// Steps:
// 1. Read bytes (UnreadableFile) + hash them for the run history
// 2. Parse + header check (MissingColumns: stop, nothing written)
// 3. Normalize → deduplicate (pure, in memory)
// 4. BEGIN; resolve identities; reconcile; record run; COMMIT
//
// Any storage error in step 4 drops the transaction, which rolls back.

use crate::db::{insert_import_run, ImportRun, SqliteStore};
use crate::deduplication::DeduplicationEngine;
use crate::error::{ImportError, Result};
use crate::normalizer::normalize_rows;
use crate::parser::parse_snapshot;
use crate::reconciliation::ReconciliationEngine;
use crate::resolver::EntityResolver;
use crate::store::ApplicationStore;
use crate::summary::RunSummary;
use chrono::Utc;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Tenant every student of this file belongs to
    pub tenant: String,

    /// Run everything, then roll back
    pub dry_run: bool,
}

impl ImportOptions {
    pub fn for_tenant(tenant: &str) -> Self {
        ImportOptions {
            tenant: tenant.to_string(),
            dry_run: false,
        }
    }
}

/// SHA-256 of the file contents, hex encoded
pub fn file_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Name recorded as a run's `source_file`: the file name, without directories
pub fn source_file_name(csv_path: &Path) -> String {
    csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| csv_path.display().to_string())
}

/// Read a CSV file and sync the database to match it.
pub fn import_applications_from_csv(
    conn: &mut Connection,
    csv_path: &Path,
    options: &ImportOptions,
) -> Result<RunSummary> {
    let bytes = std::fs::read(csv_path).map_err(|source| ImportError::UnreadableFile {
        path: csv_path.to_path_buf(),
        source,
    })?;

    let source_file = source_file_name(csv_path);

    import_snapshot(conn, &bytes, &source_file, options)
}

/// Same as `import_applications_from_csv`, for bytes already in memory.
pub fn import_snapshot(
    conn: &mut Connection,
    bytes: &[u8],
    source_file: &str,
    options: &ImportOptions,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    tracing::info!(source_file, tenant = %options.tenant, dry_run = options.dry_run, "import started");

    let snapshot = parse_snapshot(bytes)?;
    let rows_read = snapshot.rows.len();

    let mut summary = RunSummary::new(&options.tenant, source_file);
    summary.dry_run = options.dry_run;

    let outcome = normalize_rows(&snapshot.rows);
    summary.record_normalization(rows_read, &outcome);

    let deduped = DeduplicationEngine::new().collapse(outcome.rows);
    summary.record_deduplication(&deduped);

    let tx = conn.transaction()?;
    {
        let store = SqliteStore::new(&tx);
        let tenant = store.find_or_create_tenant(&options.tenant)?.entity;

        let mut resolver = EntityResolver::new(&store, tenant.clone());
        let resolved = resolver.resolve_all(deduped.rows)?;
        summary.record_resolution(resolver.students_created, resolver.colleges_created);

        let report = ReconciliationEngine::new().reconcile(&store, &tenant, &resolved, started_at)?;
        summary.record_reconciliation(&report);
    }

    if options.dry_run {
        tx.rollback()?;
        tracing::info!(source_file, "dry run rolled back");
        return Ok(summary);
    }

    let run = ImportRun {
        run_id: uuid::Uuid::new_v4().to_string(),
        tenant: options.tenant.clone(),
        source_file: source_file.to_string(),
        file_sha256: file_fingerprint(bytes),
        started_at,
        finished_at: Utc::now(),
        summary: serde_json::to_value(&summary)?,
    };
    insert_import_run(&tx, &run)?;
    tx.commit()?;

    tracing::info!(
        source_file,
        run_id = %run.run_id,
        created = summary.created,
        updated = summary.updated,
        archived = summary.archived,
        anomalies = summary.anomaly_count(),
        "import committed"
    );

    Ok(summary)
}
