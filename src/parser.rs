// 🏗️ CSV Parser - header validation + raw rows
//
// District exports are messy: column names come with random casing,
// stray whitespace, a BOM on the first header, extra columns we don't care
// about, and short rows. This module only deals with the SHAPE of the file.
// Cleaning the values is the normalizer's job.

use crate::error::{ImportError, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::io::Read;

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub const STUDENT_NUMBER: &str = "student_number";
pub const CEEB_CODE: &str = "ceeb_code";
pub const COLLEGE_NAME: &str = "college_name";
pub const APPLICATION_RESULT: &str = "application_result";
pub const APPLICATION_TYPE: &str = "application_type";
pub const ATTENDING: &str = "attending";

/// Canonical header form: no BOM, trimmed, lower-case.
pub fn clean_column_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

// ============================================================================
// RAW ROW
// ============================================================================

/// One CSV record exactly as it appeared in the file (untrimmed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Line in the source file (header is line 1)
    pub line: usize,
    pub student_number: String,
    pub ceeb_code: String,
    pub college_name: String,
    pub application_result: String,
    pub application_type: String,
    pub attending: String,
}

// ============================================================================
// COLUMN MAP
// ============================================================================

/// Header positions of the columns we read.
///
/// The college columns are individually optional: a file needs at least one
/// way to identify the college, not both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    student_number: usize,
    ceeb_code: Option<usize>,
    college_name: Option<usize>,
    application_result: usize,
    application_type: usize,
    attending: usize,
}

impl ColumnMap {
    /// Validate the header once, before any row is touched.
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        let found: Vec<String> = headers.iter().map(clean_column_name).collect();
        let position = |name: &str| found.iter().position(|h| h == name);

        let student_number = position(STUDENT_NUMBER);
        let ceeb_code = position(CEEB_CODE);
        let college_name = position(COLLEGE_NAME);
        let application_result = position(APPLICATION_RESULT);
        let application_type = position(APPLICATION_TYPE);
        let attending = position(ATTENDING);

        let has_college = ceeb_code.is_some() || college_name.is_some();
        let checks = [
            (STUDENT_NUMBER, student_number.is_some()),
            (CEEB_CODE, has_college),
            (COLLEGE_NAME, has_college),
            (APPLICATION_RESULT, application_result.is_some()),
            (APPLICATION_TYPE, application_type.is_some()),
            (ATTENDING, attending.is_some()),
        ];
        let missing: Vec<String> = checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.to_string())
            .collect();

        match (student_number, application_result, application_type, attending) {
            (Some(student_number), Some(application_result), Some(application_type), Some(attending))
                if missing.is_empty() =>
            {
                Ok(ColumnMap {
                    student_number,
                    ceeb_code,
                    college_name,
                    application_result,
                    application_type,
                    attending,
                })
            }
            _ => Err(ImportError::MissingColumns { missing, found }),
        }
    }

    /// Build a RawRow. Fields past the end of a short record read as blank.
    pub fn extract(&self, record: &StringRecord, line: usize) -> RawRow {
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or("")
                .to_string()
        };

        RawRow {
            line,
            student_number: field(Some(self.student_number)),
            ceeb_code: field(self.ceeb_code),
            college_name: field(self.college_name),
            application_result: field(Some(self.application_result)),
            application_type: field(Some(self.application_type)),
            attending: field(Some(self.attending)),
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Every data row of a parsed file, in file order.
#[derive(Debug, Clone)]
pub struct CsvSnapshot {
    pub rows: Vec<RawRow>,
}

/// Parse a snapshot from any reader.
///
/// Fails with `MissingColumns` before reading a single data row.
pub fn parse_snapshot<R: Read>(input: R) -> Result<CsvSnapshot> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|source| ImportError::Csv { line: 1, source })?
        .clone();
    let columns_map = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx + 2; // 1-indexed + header row
        let record = result.map_err(|source| ImportError::Csv {
            line: source
                .position()
                .map(|p| p.line())
                .unwrap_or(fallback_line as u64),
            source,
        })?;

        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        // Whitespace-only lines come through as a single blank field.
        // A row of empty cells (",,,,,") is still a row: the normalizer reports it.
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }

        rows.push(columns_map.extract(&record, line));
    }

    Ok(CsvSnapshot { rows })
}

// ============================================================================
// TESTS
// ============================================================================
