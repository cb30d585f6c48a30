// 🔍 Deduplication Engine - one row per (student, college)
//
// Districts re-export the same application several times in one file as
// its status moves along. The LAST occurrence in file order is the current
// state, so later rows overwrite earlier ones.

use crate::normalizer::NormalizedRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// MATCH KEY
// ============================================================================

/// How a row identifies its college.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollegeIdentity {
    /// Exact (opaque) ceeb_code
    Code(String),
    /// Lower-cased college name, used only when ceeb_code is blank
    Name(String),
}

impl CollegeIdentity {
    pub fn of(row: &NormalizedRow) -> Self {
        if row.has_ceeb_code() {
            CollegeIdentity::Code(row.ceeb_code.clone())
        } else {
            CollegeIdentity::Name(row.college_name.to_lowercase())
        }
    }
}

/// (student_number, college identity)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub student_number: String,
    pub college: CollegeIdentity,
}

impl MatchKey {
    pub fn of(row: &NormalizedRow) -> Self {
        MatchKey {
            student_number: row.student_number.clone(),
            college: CollegeIdentity::of(row),
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.college {
            CollegeIdentity::Code(code) => write!(f, "{} @ ceeb:{}", self.student_number, code),
            CollegeIdentity::Name(name) => write!(f, "{} @ name:{}", self.student_number, name),
        }
    }
}

// ============================================================================
// DEDUPLICATION RESULT
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DeduplicatedRows {
    /// Surviving rows, ordered by the file position of the winning row
    pub rows: Vec<NormalizedRow>,

    /// How many input rows were overwritten by a later duplicate
    pub collapsed: usize,
}

impl DeduplicatedRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

/// Last-write-wins collapse over MatchKeys
pub struct DeduplicationEngine;

impl DeduplicationEngine {
    pub fn new() -> Self {
        DeduplicationEngine
    }

    /// Collapse rows sharing a MatchKey. Input must be in file order.
    pub fn collapse(&self, rows: Vec<NormalizedRow>) -> DeduplicatedRows {
        let total = rows.len();
        let mut latest: HashMap<MatchKey, (usize, NormalizedRow)> = HashMap::with_capacity(total);

        for (position, row) in rows.into_iter().enumerate() {
            let key = MatchKey::of(&row);
            if let Some((_, previous)) = latest.insert(key, (position, row)) {
                tracing::debug!(line = previous.line, "duplicate row overwritten by a later one");
            }
        }

        let mut survivors: Vec<(usize, NormalizedRow)> = latest.into_values().collect();
        survivors.sort_by_key(|(position, _)| *position);

        let rows: Vec<NormalizedRow> = survivors.into_iter().map(|(_, row)| row).collect();
        let collapsed = total - rows.len();

        DeduplicatedRows { rows, collapsed }
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Attending;

    fn create_test_row(line: usize, student: &str, ceeb: &str, name: &str, result: &str) -> NormalizedRow {
        NormalizedRow {
            line,
            student_number: student.to_string(),
            ceeb_code: ceeb.to_string(),
            college_name: name.to_string(),
            application_result: Some(result.to_string()),
            application_type: Some("Early Action".to_string()),
            attending: Attending::Unknown,
        }
    }

    #[test]
    fn test_last_occurrence_wins() {
        let engine = DeduplicationEngine::new();

        let rows = vec![
            create_test_row(2, "S1", "C1", "College One", "accepted"),
            create_test_row(3, "S1", "C1", "College One", "denied"),
        ];

        let deduped = engine.collapse(rows);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped.collapsed, 1);
        assert_eq!(deduped.rows[0].application_result.as_deref(), Some("denied"));
        assert_eq!(deduped.rows[0].line, 3);
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let engine = DeduplicationEngine::new();

        let rows = vec![
            create_test_row(2, "974195", "", "Quinnipiac University", ""),
            create_test_row(3, "974195", "", "quinnipiac university", "accepted"),
        ];

        let deduped = engine.collapse(rows);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped.rows[0].application_result.as_deref(), Some("accepted"));
    }

    #[test]
    fn test_code_and_name_are_different_keys() {
        let engine = DeduplicationEngine::new();

        // Same name, one with a code and one without: different identities
        let rows = vec![
            create_test_row(2, "S1", "3771", "Suffolk University", "accepted"),
            create_test_row(3, "S1", "", "Suffolk University", "denied"),
        ];

        let deduped = engine.collapse(rows);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.collapsed, 0);
    }

    #[test]
    fn test_code_wins_over_name_spelling() {
        let engine = DeduplicationEngine::new();

        // Same code, different spelling of the name: one key
        let rows = vec![
            create_test_row(2, "S1", "3771", "Suffolk Univ", "denied"),
            create_test_row(3, "S1", "3771", "Suffolk University", "accepted"),
        ];

        let deduped = engine.collapse(rows);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped.rows[0].college_name, "Suffolk University");
    }

    #[test]
    fn test_output_follows_winning_row_position() {
        let engine = DeduplicationEngine::new();

        let rows = vec![
            create_test_row(2, "S1", "C1", "One", "denied"),
            create_test_row(3, "S2", "C2", "Two", "accepted"),
            create_test_row(4, "S1", "C1", "One", "accepted"),
        ];

        let deduped = engine.collapse(rows);

        let lines: Vec<usize> = deduped.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_match_key_display() {
        let row = create_test_row(2, "S1", "", "Acme U", "accepted");
        assert_eq!(MatchKey::of(&row).to_string(), "S1 @ name:acme u");
    }
}
