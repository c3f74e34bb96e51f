use super::pattern::Prediction;
use crate::key::CacheKey;

/// Keys worth prefetching: predictions strictly above `threshold`, in
/// prediction order
pub fn prefetch_candidates(predictions: Vec<Prediction>, threshold: f64) -> Vec<CacheKey> {
    predictions
        .into_iter()
        .filter(|p| p.probability > threshold)
        .map(|p| p.key)
        .collect()
}
