// 🏫 Tenant (district) - the organizational scope of every import
//
// All students of a run are attributed to one tenant. Its name comes from
// configuration, never from the CSV.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TENANT: &str = "SchooLinks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
}
