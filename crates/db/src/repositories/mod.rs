//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod reference_data_repo;
pub mod validation_config_repo;
pub mod validation_record_repo;
pub mod validation_result_repo;

pub use reference_data_repo::ReferenceDataRepo;
pub use validation_config_repo::ValidationConfigRepo;
pub use validation_record_repo::ValidationRecordRepo;
pub use validation_result_repo::ValidationResultRepo;
