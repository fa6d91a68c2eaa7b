/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A single record under validation: a JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Reference data for one run, keyed by reference source name.
pub type ReferenceBundle = serde_json::Map<String, serde_json::Value>;

/// Free-form, rule-type-specific parameter bag.
pub type RuleParams = serde_json::Map<String, serde_json::Value>;
