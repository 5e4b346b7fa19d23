//! Persistence gateways for named libraries.
//!
//! A gateway stores one JSON blob per library name. Loading returns the raw
//! JSON so callers can tell the legacy array shape from the current
//! summary/details shape; saving always writes the current shape.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Library;

pub use file::FileGateway;
pub use memory::MemoryGateway;

/// Errors raised by a gateway call
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to lock library storage: {0}")]
    Lock(String),
}

/// Trait for library storage backends
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Names of all stored libraries, sorted
    async fn list(&self) -> Result<Vec<String>, PersistenceError>;

    /// Raw JSON for a library, or `None` if it does not exist
    async fn load(&self, name: &str) -> Result<Option<Value>, PersistenceError>;

    /// Store a library under `name`, replacing any previous content
    async fn save(&self, name: &str, library: &Library) -> Result<(), PersistenceError>;

    /// Remove a library; removing a missing library succeeds
    async fn delete(&self, name: &str) -> Result<(), PersistenceError>;
}
