//! Cache entry model and its persisted encoding

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tiercache_proxy::FetchResponse;

use crate::error::CoreError;
use crate::key::CacheKey;

/// A stored response
///
/// Entries are immutable once written; an update is a full replacement
/// under the same key. `stored_at` is assigned once at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Bytes,
    pub headers: BTreeMap<String, String>,
    pub status: u16,
    /// Absent only on entries written without a timestamp; those never go stale
    pub stored_at: Option<DateTime<Utc>>,
}

/// Everything but the payload, stored as JSON in front of it
#[derive(Serialize, Deserialize)]
struct EntryMetadata {
    key: CacheKey,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    status: u16,
    #[serde(default)]
    stored_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn from_response(key: CacheKey, response: &FetchResponse, now: DateTime<Utc>) -> Self {
        Self {
            key,
            payload: response.body.clone(),
            headers: response.headers.clone(),
            status: response.status,
            stored_at: Some(now),
        }
    }

    /// Encode as `u32 BE metadata length | metadata JSON | payload`
    pub fn encode(&self) -> Result<Bytes, CoreError> {
        let metadata = serde_json::to_vec(&EntryMetadata {
            key: self.key.clone(),
            headers: self.headers.clone(),
            status: self.status,
            stored_at: self.stored_at,
        })?;

        let mut buf = BytesMut::with_capacity(4 + metadata.len() + self.payload.len());
        buf.put_u32(metadata.len() as u32);
        buf.put_slice(&metadata);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    pub fn decode(data: &Bytes) -> Result<Self, CoreError> {
        if data.len() < 4 {
            return Err(CoreError::Corrupt(format!(
                "entry too short: {} bytes",
                data.len()
            )));
        }

        let metadata_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let payload_start = 4 + metadata_len;
        if payload_start > data.len() {
            return Err(CoreError::Corrupt(format!(
                "metadata length {} exceeds entry size {}",
                metadata_len,
                data.len()
            )));
        }

        let metadata: EntryMetadata = serde_json::from_slice(&data[4..payload_start])
            .map_err(|e| CoreError::Corrupt(e.to_string()))?;

        Ok(Self {
            key: metadata.key,
            payload: data.slice(payload_start..),
            headers: metadata.headers,
            status: metadata.status,
            stored_at: metadata.stored_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CacheEntry {
        let response = FetchResponse::new(200, "hello world")
            .with_header("content-type", "text/plain")
            .with_header("etag", "\"abc\"");
        CacheEntry::from_response(
            CacheKey::from_raw("GET https://example.com/hello"),
            &response,
            Utc::now(),
        )
    }

    #[test]
    fn test_encode_decode() {
        let entry = sample();
        let decoded = CacheEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_binary_payload() {
        let mut entry = sample();
        entry.payload = Bytes::from(vec![0u8, 255, 1, 254, 0]);
        let decoded = CacheEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded.payload, entry.payload);
    }

    #[test]
    fn test_missing_stored_at() {
        let data = br#"{"key":"GET https://example.com/","status":200}"#;
        let mut buf = BytesMut::new();
        buf.put_u32(data.len() as u32);
        buf.put_slice(data);
        buf.put_slice(b"body");

        let entry = CacheEntry::decode(&buf.freeze()).unwrap();
        assert_eq!(entry.stored_at, None);
        assert!(entry.headers.is_empty());
        assert_eq!(entry.payload, Bytes::from_static(b"body"));
    }

    #[test]
    fn test_corrupt_input() {
        assert!(matches!(
            CacheEntry::decode(&Bytes::from_static(b"ab")),
            Err(CoreError::Corrupt(_))
        ));
        assert!(matches!(
            CacheEntry::decode(&Bytes::from_static(&[0, 0, 1, 0, b'{'])),
            Err(CoreError::Corrupt(_))
        ));
        assert!(matches!(
            CacheEntry::decode(&Bytes::from_static(&[0, 0, 0, 2, b'{', b'x'])),
            Err(CoreError::Corrupt(_))
        ));
    }
}
