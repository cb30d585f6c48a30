// 🏛️ College Entity - identity by ceeb_code, fallback by name
//
// Two colleges are the same entity iff:
// - they share a ceeb_code, or
// - neither has a ceeb_code and their names match case-insensitively
// The rule is enforced by the partial unique indexes in db.rs.
//
// ceeb_code is opaque. Observed values are alphanumeric, so it is never
// parsed as a number.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct College {
    pub id: i64,

    /// Display name from the first sighting
    pub name: String,

    /// Empty when the college was created from a row without a code
    pub ceeb_code: String,
}

impl College {
    /// Case-folded name used for fallback matching
    pub fn name_key(name: &str) -> String {
        name.trim().to_lowercase()
    }
}
