//! Rulegate core: the data model, rule registry, built-in evaluators,
//! context builder and validation engine.
//!
//! Everything here is pure logic with no I/O; storage, transport and
//! notification live in the sibling crates.

pub mod error;
pub mod types;
pub mod validation;
