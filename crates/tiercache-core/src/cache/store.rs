//! Per-tier entry store on top of the blob store

use std::sync::Arc;
use tiercache_storage::BlobStore;
use tracing::{debug, warn};

use crate::entry::CacheEntry;
use crate::error::CoreError;
use crate::key::CacheKey;

/// Maps (tier, key) to cache entries, persisted through a [`BlobStore`]
///
/// Each tier is one blob store region. The strict methods return errors;
/// the `lookup`/`store` pair used on the request path log store failures
/// and degrade to a miss or a dropped write.
pub struct EntryStore {
    blobs: Arc<dyn BlobStore>,
}

impl EntryStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub async fn open(&self, tier: &str) -> Result<(), CoreError> {
        Ok(self.blobs.open(tier).await?)
    }

    pub async fn get(&self, tier: &str, key: &CacheKey) -> Result<Option<CacheEntry>, CoreError> {
        match self.blobs.get(tier, key.as_str()).await? {
            Some(data) => Ok(Some(CacheEntry::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// Write an entry under its own key, replacing any previous one
    pub async fn put(&self, tier: &str, entry: &CacheEntry) -> Result<(), CoreError> {
        let data = entry.encode()?;
        debug!(
            "Storing {} in tier {} ({} bytes)",
            entry.key,
            tier,
            data.len()
        );
        self.blobs.put(tier, entry.key.as_str(), data).await?;
        Ok(())
    }

    pub async fn delete(&self, tier: &str, key: &CacheKey) -> Result<bool, CoreError> {
        Ok(self.blobs.delete(tier, key.as_str()).await?)
    }

    /// Keys of a tier, oldest write first
    pub async fn keys(&self, tier: &str) -> Result<Vec<CacheKey>, CoreError> {
        Ok(self
            .blobs
            .keys(tier)
            .await?
            .into_iter()
            .map(CacheKey::from_raw)
            .collect())
    }

    /// Stored bytes in a tier
    pub async fn size(&self, tier: &str) -> Result<u64, CoreError> {
        Ok(self.blobs.size(tier).await?)
    }

    /// Read an entry, treating any failure as a miss
    pub async fn lookup(&self, tier: &str, key: &CacheKey) -> Option<CacheEntry> {
        match self.get(tier, key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed for {} in tier {}: {}", key, tier, e);
                None
            }
        }
    }

    /// Write an entry, dropping it on failure
    pub async fn store(&self, tier: &str, entry: &CacheEntry) -> bool {
        match self.put(tier, entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write failed for {} in tier {}: {}", entry.key, tier, e);
                false
            }
        }
    }
}
