//! D1: balanced binary tree over 64-bit DCT hashes (§4.D). Rebuilt on every
//! mutation — cheap for the corpus sizes this backend targets.

use crate::{Algo, Index, Match, SearchParams};
use media_dedup_common::{Media, MediaId};
use media_dedup_hash::hamm64;
use std::collections::HashSet;

const LEAF_SIZE: usize = 32;
/// Bit 0 is reserved (always clear, §4.A) so it carries no split information.
const CANDIDATE_BITS: std::ops::Range<u32> = 1..64;

enum Node {
    Leaf(Vec<usize>),
    Split { bit: u32, zero: Box<Node>, one: Box<Node> },
}

fn build(indices: Vec<usize>, hashes: &[u64], depth: usize) -> Node {
    if indices.len() <= LEAF_SIZE || depth > 48 {
        return Node::Leaf(indices);
    }
    let mut best_bit = None;
    let mut best_imbalance = usize::MAX;
    for bit in CANDIDATE_BITS {
        let ones = indices.iter().filter(|&&i| hashes[i] & (1 << bit) != 0).count();
        let zeros = indices.len() - ones;
        let imbalance = zeros.abs_diff(ones);
        if ones > 0 && zeros > 0 && imbalance < best_imbalance {
            best_imbalance = imbalance;
            best_bit = Some(bit);
        }
    }
    let Some(bit) = best_bit else {
        return Node::Leaf(indices);
    };
    let (ones, zeros): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| hashes[i] & (1 << bit) != 0);
    Node::Split {
        bit,
        zero: Box::new(build(zeros, hashes, depth + 1)),
        one: Box::new(build(ones, hashes, depth + 1)),
    }
}

fn search_node(node: &Node, hashes: &[u64], needle: u64, budget: i32, out: &mut Vec<usize>) {
    if budget < 0 {
        return;
    }
    match node {
        Node::Leaf(indices) => out.extend(indices.iter().copied()),
        Node::Split { bit, zero, one } => {
            let needle_bit = needle & (1 << bit) != 0;
            if needle_bit {
                search_node(one, hashes, needle, budget, out);
                search_node(zero, hashes, needle, budget - 1, out);
            } else {
                search_node(zero, hashes, needle, budget, out);
                search_node(one, hashes, needle, budget - 1, out);
            }
        }
    }
}

pub struct DctTreeIndex {
    media_ids: Vec<MediaId>,
    hashes: Vec<u64>,
    tree: Node,
}

impl DctTreeIndex {
    #[must_use]
    pub fn new() -> Self {
        DctTreeIndex {
            media_ids: Vec::new(),
            hashes: Vec::new(),
            tree: Node::Leaf(Vec::new()),
        }
    }

    fn rebuild(&mut self) {
        let indices: Vec<usize> = (0..self.media_ids.len())
            .filter(|&i| self.media_ids[i] != 0)
            .collect();
        self.tree = build(indices, &self.hashes, 0);
    }
}

impl Default for DctTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Index for DctTreeIndex {
    fn id(&self) -> Algo {
        Algo::Dct
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.media_ids.iter().filter(|&&id| id != 0).count()
    }

    fn memory_usage(&self) -> usize {
        self.media_ids.capacity() * 4 + self.hashes.capacity() * 8
    }

    fn media_ids(&self) -> Vec<MediaId> {
        self.media_ids.iter().copied().filter(|&id| id != 0).collect()
    }

    fn add(&mut self, group: &[Media]) {
        for m in group {
            let Some(hash) = m.dct_hash else { continue };
            self.media_ids.push(m.id);
            self.hashes.push(hash);
        }
        self.rebuild();
    }

    fn remove(&mut self, ids: &[MediaId]) {
        let remove: HashSet<MediaId> = ids.iter().copied().collect();
        for id in &mut self.media_ids {
            if remove.contains(id) {
                *id = 0;
            }
        }
        self.rebuild();
    }

    fn find(&self, needle: &Media, params: &SearchParams) -> Vec<Match> {
        let Some(needle_hash) = needle.dct_hash else {
            return Vec::new();
        };
        let mut candidates = Vec::new();
        let budget = params.dct_thresh as i32;
        search_node(&self.tree, &self.hashes, needle_hash, budget, &mut candidates);

        let mut matches: Vec<Match> = candidates
            .into_iter()
            .filter_map(|i| {
                let id = self.media_ids[i];
                if id == 0 {
                    return None;
                }
                let d = hamm64(needle_hash, self.hashes[i]);
                if d <= params.dct_thresh {
                    Some(Match {
                        media_id: id,
                        score: d as i32,
                        src_in: 0,
                        dst_in: 0,
                        len: 1,
                    })
                } else {
                    None
                }
            })
            .collect();
        matches.sort_by_key(|m| m.score);
        matches.truncate(params.max_matches);
        matches
    }

    fn find_index_data(&self, media: &mut Media) -> bool {
        if let Some(pos) = self.media_ids.iter().position(|&id| id == media.id) {
            media.dct_hash = Some(self.hashes[pos]);
            true
        } else {
            false
        }
    }

    fn slice(&self, ids: &HashSet<MediaId>) -> Box<dyn Index> {
        let mut sliced = DctTreeIndex::new();
        for (i, &id) in self.media_ids.iter().enumerate() {
            if id != 0 && ids.contains(&id) {
                sliced.media_ids.push(id);
                sliced.hashes.push(self.hashes[i]);
            }
        }
        sliced.rebuild();
        Box::new(sliced)
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn media(id: MediaId, hash: u64) -> Media {
        let mut m = Media::new(PathBuf::from(format!("/m{id}")), media_dedup_common::MediaType::Image);
        m.id = id;
        m.dct_hash = Some(hash);
        m
    }

    #[test]
    fn count_matches_nonzero_mediaids() {
        let mut idx = DctTreeIndex::new();
        idx.add(&[media(1, 10), media(2, 20), media(3, 30)]);
        idx.remove(&[2]);
        assert_eq!(idx.count(), 2);
        assert_eq!(idx.media_ids.iter().filter(|&&id| id != 0).count(), 2);
    }

    #[test]
    fn exact_match_is_found_with_zero_threshold() {
        let mut idx = DctTreeIndex::new();
        let items: Vec<Media> = (0..40).map(|i| media(i + 1, i as u64 * 7 + 3)).collect();
        idx.add(&items);
        let mut params = SearchParams::default();
        params.dct_thresh = 0;
        params.filter_self = false;
        let needle = media(0, 3);
        let hits = idx.find(&needle, &params);
        assert!(hits.iter().any(|m| m.media_id == 1));
    }

    #[test]
    fn removed_media_is_not_returned() {
        let mut idx = DctTreeIndex::new();
        idx.add(&[media(1, 0xff00), media(2, 0xff00)]);
        idx.remove(&[1]);
        let params = SearchParams { dct_thresh: 0, ..Default::default() };
        let hits = idx.find(&media(0, 0xff00), &params);
        assert!(hits.iter().all(|m| m.media_id != 1));
        assert!(hits.iter().any(|m| m.media_id == 2));
    }

    #[test]
    fn slice_only_contains_requested_ids() {
        let mut idx = DctTreeIndex::new();
        idx.add(&[media(1, 1), media(2, 2), media(3, 3)]);
        let keep: HashSet<MediaId> = [1, 3].into_iter().collect();
        let sliced = idx.slice(&keep);
        let mut ids = sliced.media_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }
}
