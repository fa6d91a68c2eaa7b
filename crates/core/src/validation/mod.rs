//! Rule-driven record validation.
//!
//! Configuration types, the rule registry, built-in evaluators, the context
//! builder and the engine. Everything here is pure logic with no database or
//! network dependencies.

pub mod context;
pub mod engine;
pub mod evaluator;
pub mod lookup;
pub mod registry;
pub mod rules;
