use crate::catalog::CatalogError;
use crate::compute::ComputationError;
use crate::model::GeoType;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a data-source client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Timeouts, throttling, dropped connections. Worth retrying.
    #[error("transient source failure: {0}")]
    Transient(String),
    #[error("source failure: {0}")]
    Permanent(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot access cache entry '{path}': {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Corrupt cache entry '{path}': {source}")]
    Serde { path: PathBuf, source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error("Fetching '{variable}' at {geotype} failed: {source}")]
    Source { variable: String, geotype: GeoType, source: SourceError },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Cannot start worker pool: {0}")]
    Pool(String),
    #[error("Invalid configuration '{path}': {msg}")]
    Config { path: PathBuf, msg: String },
    #[error("'{unit}' still failing after {attempts} attempts: {last}")]
    Exhausted { unit: String, attempts: u32, last: Box<EngineError> },
}

impl EngineError {
    /// Only transient source failures are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Source { source, .. } if source.is_transient())
    }
}
