// 🧹 Normalizer - RawRow → NormalizedRow (or a RowAnomaly)
//
// Never fails the run. Bad rows are dropped and reported, odd attending
// tokens are defaulted to Unknown and reported, everything else is cleaned.

use crate::parser::RawRow;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ATTENDING (tri-state)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attending {
    Yes,
    No,
    Unknown,
}

impl Attending {
    /// Parse a raw token. `None` means the token was not recognized at all.
    pub fn parse(raw: &str) -> Option<Attending> {
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(Attending::Yes),
            "0" | "false" | "no" => Some(Attending::No),
            "unknown" | "" | "nan" | "none" => Some(Attending::Unknown),
            _ => None,
        }
    }

    /// Storage form: nullable boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Attending::Yes => Some(true),
            Attending::No => Some(false),
            Attending::Unknown => None,
        }
    }

    pub fn from_bool(value: Option<bool>) -> Self {
        match value {
            Some(true) => Attending::Yes,
            Some(false) => Attending::No,
            None => Attending::Unknown,
        }
    }
}

// ============================================================================
// ROW ANOMALY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Row dropped: no student_number
    MissingStudentNumber,
    /// Row dropped: neither ceeb_code nor college_name
    MissingCollegeIdentity,
    /// Row kept, attending defaulted to Unknown
    UnrecognizedAttending { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAnomaly {
    pub line: usize,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl RowAnomaly {
    /// True when the row never made it past normalization
    pub fn drops_row(&self) -> bool {
        !matches!(self.kind, AnomalyKind::UnrecognizedAttending { .. })
    }
}

impl fmt::Display for RowAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AnomalyKind::MissingStudentNumber => {
                write!(f, "line {}: missing student_number, row skipped", self.line)
            }
            AnomalyKind::MissingCollegeIdentity => write!(
                f,
                "line {}: missing both ceeb_code and college_name, row skipped",
                self.line
            ),
            AnomalyKind::UnrecognizedAttending { token } => write!(
                f,
                "line {}: unrecognized attending value '{}', treated as unknown",
                self.line, token
            ),
        }
    }
}

// ============================================================================
// NORMALIZED ROW
// ============================================================================

/// A cleaned row. Construction goes through `normalize_row`, which
/// guarantees student_number and (ceeb_code or college_name) are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub line: usize,
    pub student_number: String,
    /// Opaque, may be alphanumeric. Empty when absent.
    pub ceeb_code: String,
    /// Display form (trimmed, original casing)
    pub college_name: String,
    /// Lower-cased; None when blank
    pub application_result: Option<String>,
    /// Trimmed; None when blank
    pub application_type: Option<String>,
    pub attending: Attending,
}

impl NormalizedRow {
    pub fn has_ceeb_code(&self) -> bool {
        !self.ceeb_code.is_empty()
    }
}

/// Output of a normalization pass: every surviving row plus every anomaly
#[derive(Debug, Clone, Default)]
pub struct NormalizationOutcome {
    pub rows: Vec<NormalizedRow>,
    pub anomalies: Vec<RowAnomaly>,
}

impl NormalizationOutcome {
    /// Rows dropped during normalization
    pub fn skipped(&self) -> usize {
        self.anomalies.iter().filter(|a| a.drops_row()).count()
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Clean a single row.
///
/// Returns the row (if it survives) and at most one anomaly.
pub fn normalize_row(raw: &RawRow) -> (Option<NormalizedRow>, Option<RowAnomaly>) {
    let student_number = raw.student_number.trim().to_string();
    let ceeb_code = raw.ceeb_code.trim().to_string();
    let college_name = raw.college_name.trim().to_string();

    if student_number.is_empty() {
        let anomaly = RowAnomaly {
            line: raw.line,
            kind: AnomalyKind::MissingStudentNumber,
        };
        return (None, Some(anomaly));
    }

    if ceeb_code.is_empty() && college_name.is_empty() {
        let anomaly = RowAnomaly {
            line: raw.line,
            kind: AnomalyKind::MissingCollegeIdentity,
        };
        return (None, Some(anomaly));
    }

    let (attending, anomaly) = match Attending::parse(&raw.attending) {
        Some(a) => (a, None),
        None => (
            Attending::Unknown,
            Some(RowAnomaly {
                line: raw.line,
                kind: AnomalyKind::UnrecognizedAttending {
                    token: raw.attending.trim().to_string(),
                },
            }),
        ),
    };

    let row = NormalizedRow {
        line: raw.line,
        student_number,
        ceeb_code,
        college_name,
        application_result: non_blank(raw.application_result.trim().to_lowercase()),
        application_type: non_blank(raw.application_type.trim().to_string()),
        attending,
    };

    (Some(row), anomaly)
}

/// Normalize every row of a snapshot, in file order.
pub fn normalize_rows(raw_rows: &[RawRow]) -> NormalizationOutcome {
    let mut outcome = NormalizationOutcome::default();

    for raw in raw_rows {
        let (row, anomaly) = normalize_row(raw);

        if let Some(anomaly) = anomaly {
            tracing::warn!(line = anomaly.line, "{}", anomaly);
            outcome.anomalies.push(anomaly);
        }
        if let Some(row) = row {
            outcome.rows.push(row);
        }
    }

    outcome
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(line: usize, student: &str, ceeb: &str, name: &str, attending: &str) -> RawRow {
        RawRow {
            line,
            student_number: student.to_string(),
            ceeb_code: ceeb.to_string(),
            college_name: name.to_string(),
            application_result: " Accepted ".to_string(),
            application_type: " Early Action ".to_string(),
            attending: attending.to_string(),
        }
    }

    #[test]
    fn test_attending_tokens() {
        let inputs = ["1", "0", "unknown", "", "maybe"];
        let rows: Vec<RawRow> = inputs
            .iter()
            .enumerate()
            .map(|(i, token)| raw(i + 2, "974228", "2295", "Stonehill College", token))
            .collect();

        let outcome = normalize_rows(&rows);

        let attending: Vec<Attending> = outcome.rows.iter().map(|r| r.attending).collect();
        assert_eq!(
            attending,
            vec![
                Attending::Yes,
                Attending::No,
                Attending::Unknown,
                Attending::Unknown,
                Attending::Unknown,
            ]
        );
        assert_eq!(outcome.anomalies.len(), 1);
        assert_eq!(
            outcome.anomalies[0].kind,
            AnomalyKind::UnrecognizedAttending { token: "maybe".to_string() }
        );
        assert_eq!(outcome.skipped(), 0);
    }

    #[test]
    fn test_attending_case_insensitive() {
        assert_eq!(Attending::parse(" TRUE "), Some(Attending::Yes));
        assert_eq!(Attending::parse("No"), Some(Attending::No));
        assert_eq!(Attending::parse("Unknown"), Some(Attending::Unknown));
        assert_eq!(Attending::parse("NaN"), Some(Attending::Unknown));
        assert_eq!(Attending::parse("2"), None);
    }

    #[test]
    fn test_strings_are_cleaned() {
        let (row, anomaly) = normalize_row(&raw(2, " 974228 ", " 2295 ", "  Stonehill College ", "1"));
        let row = row.unwrap();

        assert!(anomaly.is_none());
        assert_eq!(row.student_number, "974228");
        assert_eq!(row.ceeb_code, "2295");
        assert_eq!(row.college_name, "Stonehill College");
        assert_eq!(row.application_result.as_deref(), Some("accepted"));
        assert_eq!(row.application_type.as_deref(), Some("Early Action"));
    }

    #[test]
    fn test_blank_result_and_type_become_none() {
        let mut input = raw(2, "996713", "", "Lasell University", "0");
        input.application_result = "   ".to_string();
        input.application_type = String::new();

        let (row, _) = normalize_row(&input);
        let row = row.unwrap();

        assert_eq!(row.application_result, None);
        assert_eq!(row.application_type, None);
        assert!(!row.has_ceeb_code());
    }

    #[test]
    fn test_rows_without_identity_are_dropped() {
        let rows = vec![
            raw(2, "  ", "2295", "Stonehill College", "1"),
            raw(3, "974228", " ", "", "1"),
            raw(4, "974228", "", "Lasell University", "1"),
        ];

        let outcome = normalize_rows(&rows);

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].line, 4);
        assert_eq!(outcome.skipped(), 2);
        assert_eq!(outcome.anomalies[0].kind, AnomalyKind::MissingStudentNumber);
        assert_eq!(outcome.anomalies[1].kind, AnomalyKind::MissingCollegeIdentity);
        assert!(outcome.anomalies[1].to_string().contains("line 3"));
    }
}
