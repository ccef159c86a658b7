//! D3: brute-force Hamming matcher over ORB binary descriptors (§4.D).
//! Not on the hot search path — consumed by the template-match post-filter
//! (§4.J) rather than by `Engine::query`'s primary dispatch.

use crate::{Algo, Index, Match, SearchParams};
use media_dedup_common::{Media, MediaId};
use std::collections::HashSet;

fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Count of descriptor pairs between `needle` and `candidate` within
/// `max_dist` Hamming distance (bits). Used directly by the template-match
/// crate as well as through the `Index` contract.
#[must_use]
pub fn count_good_matches(needle: &[Vec<u8>], candidate: &[Vec<u8>], max_dist: u32) -> usize {
    needle
        .iter()
        .filter(|nd| candidate.iter().any(|cd| hamming_distance(nd, cd) <= max_dist))
        .count()
}

pub struct CvFeatureIndex {
    media_ids: Vec<MediaId>,
    descriptors: Vec<Vec<Vec<u8>>>,
}

impl CvFeatureIndex {
    #[must_use]
    pub fn new() -> Self {
        CvFeatureIndex { media_ids: Vec::new(), descriptors: Vec::new() }
    }
}

impl Default for CvFeatureIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Index for CvFeatureIndex {
    fn id(&self) -> Algo {
        Algo::CvFeatures
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.media_ids.iter().filter(|&&id| id != 0).count()
    }

    fn memory_usage(&self) -> usize {
        self.descriptors
            .iter()
            .map(|d| d.iter().map(Vec::capacity).sum::<usize>())
            .sum::<usize>()
            + self.media_ids.capacity() * 4
    }

    fn media_ids(&self) -> Vec<MediaId> {
        self.media_ids.iter().copied().filter(|&id| id != 0).collect()
    }

    fn add(&mut self, group: &[Media]) {
        for m in group {
            let Some(desc) = &m.orb_descriptors else { continue };
            self.media_ids.push(m.id);
            self.descriptors.push(desc.clone());
        }
    }

    fn remove(&mut self, ids: &[MediaId]) {
        let remove: HashSet<MediaId> = ids.iter().copied().collect();
        for id in &mut self.media_ids {
            if remove.contains(id) {
                *id = 0;
            }
        }
    }

    fn find(&self, needle: &Media, params: &SearchParams) -> Vec<Match> {
        let Some(needle_desc) = &needle.orb_descriptors else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (i, &id) in self.media_ids.iter().enumerate() {
            if id == 0 {
                continue;
            }
            let matched = count_good_matches(needle_desc, &self.descriptors[i], params.cv_thresh);
            if matched >= params.min_matches {
                out.push(Match {
                    media_id: id,
                    score: -(matched as i32),
                    src_in: 0,
                    dst_in: 0,
                    len: 1,
                });
            }
        }
        out.sort_by_key(|m| m.score);
        out.truncate(params.max_matches);
        out
    }

    fn find_index_data(&self, media: &mut Media) -> bool {
        if let Some(pos) = self.media_ids.iter().position(|&id| id == media.id) {
            media.orb_descriptors = Some(self.descriptors[pos].clone());
            true
        } else {
            false
        }
    }

    fn slice(&self, ids: &HashSet<MediaId>) -> Box<dyn Index> {
        let mut sliced = CvFeatureIndex::new();
        for (i, &id) in self.media_ids.iter().enumerate() {
            if id != 0 && ids.contains(&id) {
                sliced.media_ids.push(id);
                sliced.descriptors.push(self.descriptors[i].clone());
            }
        }
        Box::new(sliced)
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_descriptors_match_fully() {
        let a = vec![vec![0u8; 32], vec![1u8; 32]];
        let b = a.clone();
        assert_eq!(count_good_matches(&a, &b, 0), 2);
    }

    #[test]
    fn unrelated_descriptors_score_low() {
        let a = vec![vec![0u8; 32]];
        let b = vec![vec![0xffu8; 32]];
        assert_eq!(count_good_matches(&a, &b, 10), 0);
    }
}
