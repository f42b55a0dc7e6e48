//! Error types for the fusion engine

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the fusion pipeline
///
/// Only `EmptyInput` and `Config` abort a fusion run. Schema and arbitration
/// failures are recovered locally and reported through the outcome.
#[derive(Debug, Error)]
pub enum FusionError {
    /// No detector results to fuse
    #[error("No detector results supplied")]
    EmptyInput,

    /// A source's payload failed normalization
    #[error("Schema error in source '{source_name}': {reason}")]
    Schema { source_name: String, reason: String },

    /// External arbitration did not answer in time
    #[error("Arbitration timed out after {0:?}")]
    ArbitrationTimeout(Duration),

    /// External arbitration failed or returned an unusable verdict
    #[error("Arbitration failed: {0}")]
    Arbitration(String),

    /// Invalid fusion configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] floorfuse_common::Error),
}

impl FusionError {
    pub fn schema(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        FusionError::Schema {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for fusion operations
pub type Result<T> = std::result::Result<T, FusionError>;
