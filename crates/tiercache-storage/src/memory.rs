//! In-memory blob store

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::backend::{BlobStore, validate_region};
use crate::error::StorageError;

/// In-memory blob store
///
/// Satisfies the same contract as the persistent backends but keeps
/// everything in process memory. Used in tests and for `backend = "memory"`.
#[derive(Default)]
pub struct MemoryBlobStore {
    regions: RwLock<HashMap<String, Vec<(String, Bytes)>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open(&self, region: &str) -> Result<(), StorageError> {
        validate_region(region)?;
        self.regions.write().entry(region.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>, StorageError> {
        let regions = self.regions.read();
        let entries = regions
            .get(region)
            .ok_or_else(|| StorageError::RegionNotOpen(region.to_string()))?;

        Ok(entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, data)| data.clone()))
    }

    async fn put(&self, region: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        let mut regions = self.regions.write();
        let entries = regions
            .get_mut(region)
            .ok_or_else(|| StorageError::RegionNotOpen(region.to_string()))?;

        entries.retain(|(k, _)| k != key);
        entries.push((key.to_string(), data));
        Ok(())
    }

    async fn delete(&self, region: &str, key: &str) -> Result<bool, StorageError> {
        let mut regions = self.regions.write();
        let entries = regions
            .get_mut(region)
            .ok_or_else(|| StorageError::RegionNotOpen(region.to_string()))?;

        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        Ok(entries.len() != before)
    }

    async fn keys(&self, region: &str) -> Result<Vec<String>, StorageError> {
        let regions = self.regions.read();
        let entries = regions
            .get(region)
            .ok_or_else(|| StorageError::RegionNotOpen(region.to_string()))?;

        Ok(entries.iter().map(|(k, _)| k.clone()).collect())
    }

    async fn size(&self, region: &str) -> Result<u64, StorageError> {
        let regions = self.regions.read();
        let entries = regions
            .get(region)
            .ok_or_else(|| StorageError::RegionNotOpen(region.to_string()))?;

        Ok(entries.iter().map(|(_, data)| data.len() as u64).sum())
    }
}
