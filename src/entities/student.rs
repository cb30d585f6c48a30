// 🎓 Student - identity is (tenant, student_number)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub tenant_id: i64,
    pub student_number: String,
}
