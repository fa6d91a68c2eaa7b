//! Validation pipeline: the collaborator seams, the orchestrator that drives
//! a run across them, and the Postgres and in-memory store implementations.

pub mod memory;
pub mod orchestrator;
pub mod pg;
pub mod store;

pub use memory::InMemoryStore;
pub use orchestrator::{
    ExecutionError, ExecutionParams, ExecutionSummary, JobAck, Orchestrator,
    ValidationExecutionFailed,
};
pub use pg::PgStore;
pub use store::{
    ConfigStore, DataSource, RecordSource, ReferenceStore, ResultStore, SavedValidationResult,
    StoreError, ValidationResultFilter,
};
