//! Domain models with validation at construction
//!
//! All request input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod table;
pub mod student;
pub mod query;

pub use validation::ValidationError;
pub use table::TableName;
pub use student::{Email, NewStudent, StudentName};
pub use query::QueryText;
