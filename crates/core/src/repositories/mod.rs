//! Services over the HMS database.
//!
//! Each service takes the shared [`CoreConfig`](crate::CoreConfig) and opens its own connection
//! per operation.

pub mod doctors;
pub mod linkage;
pub mod medical_records;
