//! Persistent key/value storage boundary
//!
//! Modelled on a flash-backed namespace: writes and erasures are staged and
//! only become durable after [`KeyValueStore::commit`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are corrupt: {0}")]
    Corrupt(String),

    #[error("failed to encode record: {0}")]
    Encoding(String),
}

/// Namespaced byte-record storage
///
/// `get` observes staged writes. A record whose length differs from what the
/// caller expects is the caller's business to treat as absent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn erase(&self, key: &str) -> Result<(), StoreError>;

    /// Make every staged change durable in one step
    fn commit(&self) -> Result<(), StoreError>;
}
