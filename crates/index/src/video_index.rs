//! D5: video-frame DCT index (§4.D). A sorted `mediaids` array backs
//! binary-search lookup from internal index to media id; a `RadixMap`
//! indexes every kept frame of every video.

use crate::radix::RadixMap;
use crate::{Algo, Index, Match, SearchParams};
use media_dedup_common::{Media, MediaId};
use media_dedup_video_index::VideoIndex;
use std::collections::HashSet;

const MIN_SET_BITS: u32 = 5;
const MAX_SET_BITS: u32 = 59;

pub struct VideoDctIndex {
    radix_bits: u32,
    media_ids: Vec<MediaId>,
    frames: Vec<Vec<(i32, u64)>>,
    radix: RadixMap,
}

impl VideoDctIndex {
    #[must_use]
    pub fn new(radix_bits: u32) -> Self {
        VideoDctIndex {
            radix_bits,
            media_ids: Vec::new(),
            frames: Vec::new(),
            radix: RadixMap::new(radix_bits),
        }
    }

    fn internal_index_of(&self, media_id: MediaId) -> Option<usize> {
        self.media_ids.binary_search(&media_id).ok()
    }

    /// Populate one video's frame stream, applying the low-information and
    /// edge-trim filters on load (§4.D D5).
    pub fn add_video(&mut self, media_id: MediaId, index: &VideoIndex, skip_frames: usize) {
        let n = index.frames.len();
        let kept: Vec<(i32, u64)> = index
            .frames
            .iter()
            .zip(index.hashes.iter())
            .enumerate()
            .filter(|&(i, (_, &hash))| {
                let bits = hash.count_ones();
                i >= skip_frames && i + skip_frames < n && (MIN_SET_BITS..=MAX_SET_BITS).contains(&bits)
            })
            .map(|(_, (&f, &h))| (f, h))
            .collect();

        let pos = match self.media_ids.binary_search(&media_id) {
            Ok(p) => p,
            Err(p) => {
                self.media_ids.insert(p, media_id);
                self.frames.insert(p, Vec::new());
                p
            }
        };
        self.frames[pos] = kept;
        for (frame, hash) in self.frames[pos].iter().copied() {
            self.radix.insert(hash, pos as u32, frame as u32);
        }
    }

    /// Video-vs-video query (§4.D D5): search every needle frame, keep the
    /// closest hit per `(needle_frame, candidate_media)` pair, then require
    /// total-matches and ordering-locality thresholds.
    #[must_use]
    pub fn find_video(&self, needle_frames: &[(i32, u64)], params: &SearchParams) -> Vec<Match> {
        use std::collections::HashMap;

        // (candidate_internal_idx) -> Vec<(needle_frame, candidate_frame, dist)>
        let mut by_candidate: HashMap<usize, Vec<(i32, i32, u32)>> = HashMap::new();
        for &(needle_frame, hash) in needle_frames {
            let hits = self.radix.search(hash, params.dct_thresh + 1);
            let mut best_per_candidate: HashMap<usize, (i32, u32)> = HashMap::new();
            for (entry, dist) in hits {
                let idx = entry.internal_idx as usize;
                let better = best_per_candidate
                    .get(&idx)
                    .map_or(true, |&(_, best_dist)| dist < best_dist);
                if better {
                    best_per_candidate.insert(idx, (entry.frame as i32, dist));
                }
            }
            for (idx, (cand_frame, dist)) in best_per_candidate {
                by_candidate
                    .entry(idx)
                    .or_default()
                    .push((needle_frame, cand_frame, dist));
            }
        }

        let mut out = Vec::new();
        for (idx, mut pairs) in by_candidate {
            if pairs.len() < params.min_frames_matched {
                continue;
            }
            pairs.sort_by_key(|p| p.0);
            let near = pairs
                .windows(2)
                .filter(|w| (w[1].1 - w[0].1).abs() <= params.frame_margin)
                .count();
            let near_pct = if pairs.len() > 1 {
                (near as f64 / (pairs.len() - 1) as f64 * 100.0) as u32
            } else {
                100
            };
            if near_pct < params.min_frames_near {
                continue;
            }
            let src_min = pairs.iter().map(|p| p.0).min().unwrap_or(0);
            let src_max = pairs.iter().map(|p| p.0).max().unwrap_or(0);
            let dst_in = pairs.first().map(|p| p.1).unwrap_or(0);
            let score = pairs.iter().map(|p| p.2).sum::<u32>() / pairs.len().max(1) as u32;
            out.push(Match {
                media_id: self.media_ids[idx],
                score: score as i32,
                src_in: src_min,
                dst_in,
                len: src_max - src_min + 1,
            });
        }
        out.sort_by_key(|m| m.score);
        out.truncate(params.max_matches);
        out
    }
}

impl Index for VideoDctIndex {
    fn id(&self) -> Algo {
        Algo::Video
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.media_ids.iter().filter(|&&id| id != 0).count()
    }

    fn memory_usage(&self) -> usize {
        self.radix.memory_usage()
            + self.media_ids.capacity() * 4
            + self.frames.iter().map(|f| f.capacity() * 12).sum::<usize>()
    }

    fn media_ids(&self) -> Vec<MediaId> {
        self.media_ids.iter().copied().filter(|&id| id != 0).collect()
    }

    /// Video frame streams are populated through `add_video`, which needs
    /// the full per-frame stream a bare `Media` doesn't carry. A plain
    /// `Media` here only registers the id as present with no frames.
    fn add(&mut self, group: &[Media]) {
        for m in group {
            if self.media_ids.binary_search(&m.id).is_err() {
                let pos = self.media_ids.partition_point(|&id| id < m.id);
                self.media_ids.insert(pos, m.id);
                self.frames.insert(pos, Vec::new());
            }
        }
    }

    fn remove(&mut self, ids: &[MediaId]) {
        for &id in ids {
            if let Some(pos) = self.internal_index_of(id) {
                self.media_ids[pos] = 0;
                self.frames[pos].clear();
            }
        }
    }

    /// Image-vs-video (frame-grab) query: search the single needle hash,
    /// keep the nearest frame per video.
    fn find(&self, needle: &Media, params: &SearchParams) -> Vec<Match> {
        let Some(hash) = needle.dct_hash else {
            return Vec::new();
        };
        self.find_video(&[(0, hash)], params)
    }

    fn find_index_data(&self, _media: &mut Media) -> bool {
        false
    }

    fn slice(&self, ids: &HashSet<MediaId>) -> Box<dyn Index> {
        let mut sliced = VideoDctIndex::new(self.radix_bits);
        for (i, &id) in self.media_ids.iter().enumerate() {
            if id != 0 && ids.contains(&id) {
                let pos = sliced.media_ids.len();
                sliced.media_ids.push(id);
                sliced.frames.push(self.frames[i].clone());
                for &(frame, hash) in &self.frames[i] {
                    sliced.radix.insert(hash, pos as u32, frame as u32);
                }
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

    fn vdx(frames: Vec<i32>, hashes: Vec<u64>) -> VideoIndex {
        VideoIndex::new(frames, hashes)
    }

    #[test]
    fn low_information_frames_are_dropped_on_load() {
        let mut idx = VideoDctIndex::new(8);
        // bits: 0 has 0 set bits (dropped), second has many set bits
        let v = vdx(vec![0, 10, 20, 30, 40], vec![0, 0xFF, 0x0F, 0xF0, u64::MAX]);
        idx.add_video(1, &v, 0);
        assert!(idx.frames[0].iter().all(|&(_, h)| {
            let b = h.count_ones();
            (5..=59).contains(&b)
        }));
    }

    #[test]
    fn find_video_requires_min_frames_matched() {
        let mut idx = VideoDctIndex::new(8);
        let v = vdx(vec![0, 10, 20], vec![0x0F0F, 0x1234, 0x5678]);
        idx.add_video(1, &v, 0);
        let params = SearchParams {
            dct_thresh: 0,
            min_frames_matched: 5,
            min_frames_near: 0,
            ..Default::default()
        };
        let hits = idx.find_video(&[(0, 0x0F0F)], &params);
        assert!(hits.is_empty());
    }

    #[test]
    fn find_video_matches_exact_frame_stream() {
        let mut idx = VideoDctIndex::new(8);
        let v = vdx(vec![0, 10, 20], vec![0x0F0F, 0x1234, 0x5678]);
        idx.add_video(1, &v, 0);
        let params = SearchParams {
            dct_thresh: 0,
            min_frames_matched: 1,
            min_frames_near: 0,
            frame_margin: 1000,
            ..Default::default()
        };
        let hits = idx.find_video(&[(0, 0x0F0F), (10, 0x1234), (20, 0x5678)], &params);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].media_id, 1);
    }

    #[test]
    fn removed_video_contributes_no_frames_to_slice() {
        let mut idx = VideoDctIndex::new(8);
        let v = vdx(vec![0, 10], vec![0x0F0F, 0x1234]);
        idx.add_video(1, &v, 0);
        idx.remove(&[1]);
        let ids: HashSet<MediaId> = [1].into_iter().collect();
        let sliced = idx.slice(&ids);
        assert_eq!(sliced.count(), 0);
    }
}
