//! Error types for the engine.
//!
//! Missing or thin data is not an error: the predictors fall back to simpler
//! heuristics and report which one they used. Errors are reserved for absent
//! records, unusable input, and failures of the external project store.

use thiserror::Error;

/// Failure reported by a [`ProjectStore`](crate::ProjectStore) implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced site or project record is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input cannot be analyzed (empty visit list, invalid coordinates, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The project store failed; the underlying error is passed through.
    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    pub(crate) fn site_not_found(id: &str) -> Self {
        Self::NotFound { entity: "site", id: id.to_string() }
    }

    pub(crate) fn project_not_found(id: &str) -> Self {
        Self::NotFound { entity: "project", id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
