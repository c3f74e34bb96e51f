//! Blob store trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Durable key -> bytes mapping, partitioned into named regions.
///
/// Each cache tier owns one region; the engine keeps its learned usage
/// patterns in one more. Implementations must preserve insertion order in
/// [`BlobStore::keys`]: a `put` over an existing key replaces the value and
/// moves the key to the end, and a failed `put` leaves the previous value in
/// place.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open (create if missing) a region
    async fn open(&self, region: &str) -> Result<(), StorageError>;

    /// Read a value
    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Write a value, replacing any previous one
    async fn put(&self, region: &str, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Delete a value, returning whether it existed
    async fn delete(&self, region: &str, key: &str) -> Result<bool, StorageError>;

    /// List keys of a region, oldest first
    async fn keys(&self, region: &str) -> Result<Vec<String>, StorageError>;

    /// Total size in bytes of all values stored in a region
    async fn size(&self, region: &str) -> Result<u64, StorageError>;
}

/// Validate a region name
pub fn validate_region(region: &str) -> Result<(), StorageError> {
    if region.is_empty() || region.len() > 128 {
        return Err(StorageError::InvalidRegion(region.to_string()));
    }

    let valid = region
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid {
        return Err(StorageError::InvalidRegion(region.to_string()));
    }

    Ok(())
}
