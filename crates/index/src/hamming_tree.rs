//! D2: "hamming tree" over per-feature DCT hashes (§4.D). Leaf clusters
//! hold flat `(mediaid, hash)` pairs until they cross a size threshold,
//! then split by a bit chosen on depth.

use crate::{Algo, Index, Match, SearchParams};
use media_dedup_common::{Media, MediaId};
use std::collections::{HashMap, HashSet};

/// 64 KiB of `(u32, u64)` pairs, per §4.D.
const LEAF_BYTES: usize = 64 * 1024;
const PAIR_BYTES: usize = 12;
const LEAF_CAPACITY: usize = LEAF_BYTES / PAIR_BYTES;
const TOP_N_PER_FEATURE: usize = 10;

#[derive(Clone, Copy)]
struct Pair {
    media_id: MediaId,
    hash: u64,
}

enum Node {
    Leaf(Vec<Pair>),
    Split { bit: u32, zero: Box<Node>, one: Box<Node> },
}

fn bit_for_depth(depth: usize) -> u32 {
    1 + (depth as u32 % 63)
}

fn insert(node: &mut Node, pair: Pair, depth: usize) {
    match node {
        Node::Leaf(pairs) => {
            pairs.push(pair);
            if pairs.len() > LEAF_CAPACITY {
                let bit = bit_for_depth(depth);
                let drained = std::mem::take(pairs);
                let (ones, zeros): (Vec<Pair>, Vec<Pair>) =
                    drained.into_iter().partition(|p| p.hash & (1 << bit) != 0);
                *node = Node::Split {
                    bit,
                    zero: Box::new(Node::Leaf(zeros)),
                    one: Box::new(Node::Leaf(ones)),
                };
            }
        }
        Node::Split { bit, zero, one } => {
            if pair.hash & (1 << *bit) != 0 {
                insert(one, pair, depth + 1);
            } else {
                insert(zero, pair, depth + 1);
            }
        }
    }
}

fn walk(node: &Node, needle_hash: u64, out: &mut Vec<Pair>) {
    match node {
        Node::Leaf(pairs) => out.extend(pairs.iter().copied()),
        Node::Split { bit, zero, one } => {
            if needle_hash & (1 << bit) != 0 {
                walk(one, needle_hash, out);
            } else {
                walk(zero, needle_hash, out);
            }
        }
    }
}

fn remove_tombstone(node: &mut Node, target: MediaId) {
    match node {
        Node::Leaf(pairs) => {
            for p in pairs.iter_mut() {
                if p.media_id == target {
                    p.media_id = 0;
                }
            }
        }
        Node::Split { zero, one, .. } => {
            remove_tombstone(zero, target);
            remove_tombstone(one, target);
        }
    }
}

fn count_live(node: &Node) -> usize {
    match node {
        Node::Leaf(pairs) => pairs.iter().filter(|p| p.media_id != 0).count(),
        Node::Split { zero, one, .. } => count_live(zero) + count_live(one),
    }
}

pub struct HammingTreeIndex {
    root: Node,
    media_with_features: HashSet<MediaId>,
}

impl HammingTreeIndex {
    #[must_use]
    pub fn new() -> Self {
        HammingTreeIndex {
            root: Node::Leaf(Vec::new()),
            media_with_features: HashSet::new(),
        }
    }
}

impl Default for HammingTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Index for HammingTreeIndex {
    fn id(&self) -> Algo {
        Algo::DctFeatures
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.media_with_features.len()
    }

    fn memory_usage(&self) -> usize {
        fn node_bytes(node: &Node) -> usize {
            match node {
                Node::Leaf(pairs) => pairs.capacity() * PAIR_BYTES,
                Node::Split { zero, one, .. } => node_bytes(zero) + node_bytes(one),
            }
        }
        node_bytes(&self.root)
    }

    fn media_ids(&self) -> Vec<MediaId> {
        self.media_with_features.iter().copied().collect()
    }

    fn add(&mut self, group: &[Media]) {
        for m in group {
            let Some(hashes) = &m.feature_hashes else { continue };
            if hashes.is_empty() {
                continue;
            }
            self.media_with_features.insert(m.id);
            for &h in hashes {
                insert(&mut self.root, Pair { media_id: m.id, hash: h }, 0);
            }
        }
    }

    fn remove(&mut self, ids: &[MediaId]) {
        for &id in ids {
            remove_tombstone(&mut self.root, id);
            self.media_with_features.remove(&id);
        }
    }

    fn find(&self, needle: &Media, params: &SearchParams) -> Vec<Match> {
        let Some(features) = &needle.feature_hashes else {
            return Vec::new();
        };
        let mut tally: HashMap<MediaId, usize> = HashMap::new();
        for &feature_hash in features {
            let mut candidates = Vec::new();
            walk(&self.root, feature_hash, &mut candidates);
            candidates.retain(|p| p.media_id != 0);
            candidates.sort_by_key(|p| (p.hash ^ feature_hash).count_ones());
            for p in candidates.into_iter().take(TOP_N_PER_FEATURE) {
                if (p.hash ^ feature_hash).count_ones() <= params.cv_thresh {
                    *tally.entry(p.media_id).or_insert(0) += 1;
                }
            }
        }
        let max_matches = tally.values().copied().max().unwrap_or(0);
        let mut out: Vec<Match> = tally
            .into_iter()
            .map(|(media_id, matches)| Match {
                media_id,
                score: (max_matches - matches) as i32,
                src_in: 0,
                dst_in: 0,
                len: 1,
            })
            .collect();
        out.sort_by_key(|m| m.score);
        out.truncate(params.max_matches);
        out
    }

    fn find_index_data(&self, media: &mut Media) -> bool {
        let mut out = Vec::new();
        collect_hashes_for(&self.root, media.id, &mut out);
        if out.is_empty() {
            false
        } else {
            media.feature_hashes = Some(out);
            true
        }
    }

    fn slice(&self, ids: &HashSet<MediaId>) -> Box<dyn Index> {
        let mut sliced = HammingTreeIndex::new();
        let mut pairs = Vec::new();
        collect_all(&self.root, &mut pairs);
        for p in pairs {
            if p.media_id != 0 && ids.contains(&p.media_id) {
                sliced.media_with_features.insert(p.media_id);
                insert(&mut sliced.root, p, 0);
            }
        }
        Box::new(sliced)
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn collect_hashes_for(node: &Node, target: MediaId, out: &mut Vec<u64>) {
    match node {
        Node::Leaf(pairs) => {
            out.extend(pairs.iter().filter(|p| p.media_id == target).map(|p| p.hash));
        }
        Node::Split { zero, one, .. } => {
            collect_hashes_for(zero, target, out);
            collect_hashes_for(one, target, out);
        }
    }
}

fn collect_all(node: &Node, out: &mut Vec<Pair>) {
    match node {
        Node::Leaf(pairs) => out.extend(pairs.iter().copied()),
        Node::Split { zero, one, .. } => {
            collect_all(zero, out);
            collect_all(one, out);
        }
    }
}
