// ❌ Import Errors - everything that can stop a run
//
// Row-level problems are NOT errors: they become RowAnomaly entries in the
// RunSummary and the run keeps going. Everything in here aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Header is missing one or more required columns.
    #[error("CSV missing required columns: [{}]. Found columns: [{}]", .missing.join(", "), .found.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// File does not exist or could not be opened.
    #[error("cannot read input file {}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV (bad quoting, invalid UTF-8, ...).
    #[error("malformed CSV at line {line}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },

    /// Store unreachable or a constraint violation during a write.
    #[error("storage failure")]
    Storage(#[from] rusqlite::Error),

    /// Serializing audit payloads.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Config file unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ImportError {
    /// Missing column names, when this is a header failure.
    pub fn missing_columns(&self) -> Option<&[String]> {
        match self {
            ImportError::MissingColumns { missing, .. } => Some(missing),
            _ => None,
        }
    }
}
