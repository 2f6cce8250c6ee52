//! Error types for update-gate-state

use thiserror::Error;

/// Errors that can occur in the store layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Backend query error
    #[error("Store backend failed: {0}")]
    Backend(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Record could not be (de)serialized
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A string did not name a known enum value
    #[error("invalid {kind} value: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },

    /// Seed data violated a uniqueness constraint
    #[error("duplicate {table} record: {key}")]
    Duplicate { table: &'static str, key: String },
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
