//! Staleness evaluation

use chrono::{DateTime, Utc};

use crate::config::TierConfig;
use crate::entry::CacheEntry;

/// Whether an entry has outlived its tier's maximum age
///
/// An entry exactly `max_age` old is still fresh. Entries without a
/// `stored_at` marker are never stale.
pub fn is_stale(entry: &CacheEntry, tier: &TierConfig, now: DateTime<Utc>) -> bool {
    match entry.stored_at {
        Some(stored_at) => now - stored_at > tier.max_age(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Strategy;
    use crate::key::CacheKey;
    use bytes::Bytes;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn entry(stored_at: Option<DateTime<Utc>>) -> CacheEntry {
        CacheEntry {
            key: CacheKey::from_raw("GET https://example.com/"),
            payload: Bytes::new(),
            headers: BTreeMap::new(),
            status: 200,
            stored_at,
        }
    }

    #[test]
    fn test_boundary() {
        let tier = TierConfig::new("t", Strategy::CacheFirst, 60, 10);
        let now = Utc::now();

        assert!(!is_stale(&entry(Some(now)), &tier, now));
        assert!(!is_stale(&entry(Some(now - Duration::seconds(59))), &tier, now));
        // Exactly max_age is not stale
        assert!(!is_stale(&entry(Some(now - Duration::seconds(60))), &tier, now));
        assert!(is_stale(
            &entry(Some(now - Duration::seconds(60) - Duration::milliseconds(1))),
            &tier,
            now
        ));
        assert!(is_stale(&entry(Some(now - Duration::days(1))), &tier, now));
    }

    #[test]
    fn test_missing_marker_is_fresh() {
        let tier = TierConfig::new("t", Strategy::CacheFirst, 0, 10);
        assert!(!is_stale(&entry(None), &tier, Utc::now()));
    }

    #[test]
    fn test_zero_max_age() {
        let tier = TierConfig::new("t", Strategy::CacheFirst, 0, 10);
        let now = Utc::now();
        assert!(!is_stale(&entry(Some(now)), &tier, now));
        assert!(is_stale(&entry(Some(now - Duration::seconds(1))), &tier, now));
    }

    #[test]
    fn test_unbounded_max_age_never_expires() {
        let now = Utc::now();
        for max_age_secs in [10_000_000_000_000_000, u64::MAX] {
            let tier = TierConfig::new("t", Strategy::CacheFirst, max_age_secs, 10);
            assert_eq!(tier.max_age(), Duration::MAX);
            assert!(!is_stale(&entry(Some(now - Duration::days(36_500))), &tier, now));
        }
    }
}
