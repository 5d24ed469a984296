//! Persistence of uploaded image bytes keyed by image id.

pub mod local;

use async_trait::async_trait;

use crate::error::StorageError;

pub use local::LocalFileStorage;

/// An image as found on the backing medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    /// Normalized extension of the stored file; empty when it had none.
    pub format: String,
}

/// Backing medium for image bytes.
///
/// Ids are unique per upload, so implementations never see two writes for
/// the same key and need no write-write locking. A `put` that returned `Ok`
/// must be visible in full to every later `get`; a `get` must never observe
/// a partially written file.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist `bytes` under `id` with the given file extension (no leading dot).
    async fn put(&self, id: &str, extension: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Load the bytes stored for `id`.
    ///
    /// Returns [`StorageError::NotFound`] when nothing is stored under the id,
    /// and any other variant when the medium could not be inspected.
    async fn get(&self, id: &str) -> Result<StoredImage, StorageError>;
}
