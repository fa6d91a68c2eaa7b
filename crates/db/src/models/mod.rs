//! Row structs and DTOs.
//!
//! Each entity has a `FromRow` + `Serialize` struct matching the database
//! row, plus conversions to and from the core validation types.

pub mod validation;
