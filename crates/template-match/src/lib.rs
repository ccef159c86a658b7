//! Template-match post-filter (§4.J). The feature detector/matcher/
//! transform-estimator triad is out of scope for this crate (§1); it is
//! modeled as a single injectable `AffineValidator` so the caching,
//! thresholding, and drop/keep decision around it are fully implemented
//! and testable against a stub validator.

use media_dedup_common::{Digest, Media};
use std::collections::HashMap;
use std::sync::RwLock;

/// Detect ORB features on both images, match by brute-force Hamming,
/// estimate a rigid 2D transform (minimum 3 correspondences), warp the
/// candidate into the needle frame, and return the DCT-hash Hamming
/// distance between the warped candidate and the needle — or `None` if no
/// transform could be estimated (insufficient correspondences).
pub trait AffineValidator: Send + Sync {
    fn warped_distance(&self, needle: &Media, candidate: &Media) -> Option<u32>;
}

/// A validator that always reports a fixed distance; useful for exercising
/// the cache/threshold logic without a real feature pipeline.
pub struct StubValidator {
    pub distance: Option<u32>,
}

impl AffineValidator for StubValidator {
    fn warped_distance(&self, _needle: &Media, _candidate: &Media) -> Option<u32> {
        self.distance
    }
}

fn cache_key(a: Digest, b: Digest) -> (Digest, Digest) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

/// Results are cached by the unordered digest pair so repeated queries
/// over the same corpus don't re-run feature detection.
#[derive(Default)]
pub struct TemplateMatchCache {
    entries: RwLock<HashMap<(Digest, Digest), Option<u32>>>,
}

impl TemplateMatchCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_compute(&self, needle: &Media, candidate: &Media, validator: &dyn AffineValidator) -> Option<u32> {
        let (Some(nd), Some(cd)) = (needle.digest, candidate.digest) else {
            return validator.warped_distance(needle, candidate);
        };
        let key = cache_key(nd, cd);
        if let Some(&cached) = self.entries.read().unwrap().get(&key) {
            return cached;
        }
        let computed = validator.warped_distance(needle, candidate);
        self.entries.write().unwrap().insert(key, computed);
        computed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keep only candidates whose warped-match distance is below `tm_thresh`;
/// candidates the validator can't transform (insufficient feature
/// correspondences) are dropped.
#[must_use]
pub fn filter_by_template_match(
    needle: &Media,
    candidates: Vec<Media>,
    validator: &dyn AffineValidator,
    cache: &TemplateMatchCache,
    tm_thresh: u32,
) -> Vec<Media> {
    candidates
        .into_iter()
        .filter(|candidate| {
            cache
                .get_or_compute(needle, candidate, validator)
                .map(|d| d < tm_thresh)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_dedup_common::MediaType;
    use std::path::PathBuf;

    fn media(id: u32, digest_byte: u8) -> Media {
        let mut m = Media::new(PathBuf::from(format!("/m{id}")), MediaType::Image);
        m.id = id;
        m.digest = Some(Digest([digest_byte; 16]));
        m
    }

    #[test]
    fn below_threshold_candidates_survive() {
        let validator = StubValidator { distance: Some(5) };
        let cache = TemplateMatchCache::new();
        let needle = media(0, 1);
        let candidates = vec![media(1, 2)];
        let kept = filter_by_template_match(&needle, candidates, &validator, &cache, 15);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn above_threshold_candidates_are_dropped() {
        let validator = StubValidator { distance: Some(30) };
        let cache = TemplateMatchCache::new();
        let needle = media(0, 1);
        let candidates = vec![media(1, 2)];
        let kept = filter_by_template_match(&needle, candidates, &validator, &cache, 15);
        assert!(kept.is_empty());
    }

    #[test]
    fn no_transform_estimated_drops_candidate() {
        let validator = StubValidator { distance: None };
        let cache = TemplateMatchCache::new();
        let needle = media(0, 1);
        let candidates = vec![media(1, 2)];
        let kept = filter_by_template_match(&needle, candidates, &validator, &cache, 100);
        assert!(kept.is_empty());
    }

    #[test]
    fn cache_is_populated_after_lookup() {
        let validator = StubValidator { distance: Some(5) };
        let cache = TemplateMatchCache::new();
        let needle = media(0, 1);
        let candidate = media(1, 2);
        cache.get_or_compute(&needle, &candidate, &validator);
        assert_eq!(cache.len(), 1);
        // querying the reverse pair hits the same cache entry
        cache.get_or_compute(&candidate, &needle, &validator);
        assert_eq!(cache.len(), 1);
    }
}
