// Entity Models
//
// Tenant and Student identities never change once created. College keeps
// the display name of its first sighting. CollegeApplication is the only
// entity whose values move between runs (attributes + archive state).

pub mod tenant;
pub mod student;
pub mod college;
pub mod application;

pub use tenant::{Tenant, DEFAULT_TENANT};
pub use student::Student;
pub use college::College;
pub use application::{ApplicationAttributes, CollegeApplication};
