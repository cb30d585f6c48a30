// College Sync - Core Library
// CSV snapshot of college applications → deduplicated, reconciled SQLite store

pub mod error;
pub mod config;
pub mod parser;         // CSV shape: header check + raw rows
pub mod normalizer;     // RawRow → NormalizedRow | RowAnomaly
pub mod deduplication;  // last-write-wins per MatchKey
pub mod entities;
pub mod store;          // storage seam used by resolver + reconciler
pub mod db;             // SQLite schema + SqliteStore
pub mod resolver;       // Student / College identity resolution
pub mod reconciliation; // create / update / reactivate / archive
pub mod summary;
pub mod importer;

// Re-export commonly used types
pub use error::{ImportError, Result};
pub use config::{FileConfig, ImportConfig};
pub use parser::{parse_snapshot, ColumnMap, CsvSnapshot, RawRow};
pub use normalizer::{
    normalize_row, normalize_rows, AnomalyKind, Attending, NormalizationOutcome,
    NormalizedRow, RowAnomaly,
};
pub use deduplication::{CollegeIdentity, DeduplicatedRows, DeduplicationEngine, MatchKey};
pub use entities::{ApplicationAttributes, College, CollegeApplication, Student, Tenant};
pub use store::{ApplicationStore, Resolved};
pub use db::{
    Event, ImportRun, SqliteStore,
    setup_database, insert_event, get_events_for_entity,
    insert_import_run, get_import_runs,
    count_students, count_colleges, count_applications,
};
pub use resolver::{CollegeLookup, EntityResolver, ResolvedRow};
pub use reconciliation::{ApplicationChange, ReconciliationEngine, ReconciliationReport};
pub use summary::{RunFailure, RunSummary};
pub use importer::{
    file_fingerprint, import_applications_from_csv, import_snapshot, source_file_name, ImportOptions,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
