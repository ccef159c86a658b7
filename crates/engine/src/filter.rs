//! Query filter (§4.I): pre/post-filtering of raw match results, plus the
//! group-level operations (`filter_groups`/`merge_groups`/`expand_groups`)
//! used when reporting clusters of mutually-similar media rather than
//! single-needle query results.

use media_dedup_common::{Media, MediaId, MatchFlags};
use media_dedup_index::SearchParams;
use media_dedup_store::{NegativeMatchMap, WeedMap};
use std::collections::{HashMap, HashSet};

/// Populate `match_flags` by comparing needle vs. candidate metadata
/// (§10.6 — the original's `Media::compare` does this, so the query
/// filter does here too).
#[must_use]
pub fn compute_match_flags(needle: &Media, candidate: &Media) -> MatchFlags {
    let mut flags = MatchFlags::default();
    if needle.digest.is_some() && needle.digest == candidate.digest {
        flags |= MatchFlags::EXACT_DIGEST;
    }
    if u64::from(candidate.width) * u64::from(candidate.height)
        > u64::from(needle.width) * u64::from(needle.height)
    {
        flags |= MatchFlags::BIGGER_DIMS;
    }
    if candidate.file_size > needle.file_size {
        flags |= MatchFlags::BIGGER_FILE;
    }
    let needle_pixels = u64::from(needle.width) * u64::from(needle.height);
    let candidate_pixels = u64::from(candidate.width) * u64::from(candidate.height);
    if needle_pixels > 0 && candidate_pixels > 0 {
        let needle_bpp = needle.file_size as f64 / needle_pixels as f64;
        let candidate_bpp = candidate.file_size as f64 / candidate_pixels as f64;
        if candidate_bpp > needle_bpp {
            flags |= MatchFlags::LESS_COMPRESSED;
        }
    }
    flags
}

/// Drop the needle itself from its own result set.
pub fn filter_self(results: Vec<Media>, needle_id: MediaId) -> Vec<Media> {
    results.into_iter().filter(|m| m.id != needle_id).collect()
}

/// `params.in_path` keeps only matches under that prefix; `params.path`
/// (used here as the drop-prefix) removes matches under it.
pub fn filter_path(results: Vec<Media>, params: &SearchParams) -> Vec<Media> {
    results
        .into_iter()
        .filter(|m| {
            let keep = params.in_path.as_ref().map_or(true, |p| m.path.starts_with(p));
            let dropped = params.path.as_ref().is_some_and(|p| m.path.starts_with(p));
            keep && !dropped
        })
        .collect()
}

/// Drop results sharing the needle's immediate parent directory (for
/// archive members, the archive itself).
pub fn filter_parent(results: Vec<Media>, needle_path: &std::path::Path) -> Vec<Media> {
    let needle_parent = parent_of(needle_path);
    results.into_iter().filter(|m| parent_of(&m.path) != needle_parent).collect()
}

fn parent_of(path: &std::path::Path) -> std::path::PathBuf {
    let s = path.to_string_lossy();
    if let Some((archive, _)) = media_dedup_scanner::split_virtual_path(&s) {
        archive
    } else {
        path.parent().map(std::path::Path::to_path_buf).unwrap_or_default()
    }
}

/// Drop results forming a blacklisted `{needle, m}` pair.
pub fn filter_negative_match(results: Vec<Media>, needle: &Media, neg: &NegativeMatchMap) -> Vec<Media> {
    let Some(needle_digest) = needle.digest else { return results };
    results
        .into_iter()
        .filter(|m| m.digest.map_or(true, |d| !neg.is_negative_match(needle_digest, d)))
        .collect()
}

/// Tag each result whose digest is a weed source, per the store's weed map.
pub fn tag_weed(mut results: Vec<Media>, weed: &WeedMap) -> Vec<Media> {
    for m in &mut results {
        if let Some(d) = m.digest {
            m.is_weed = weed.is_weed_key(d);
        }
    }
    results
}

/// Discard the whole result set if it doesn't meet the minimum count.
#[must_use]
pub fn apply_min_matches(results: Vec<Media>, min_matches: usize) -> Vec<Media> {
    if results.len() < min_matches {
        Vec::new()
    } else {
        results
    }
}

fn canonical_key(group: &[MediaId]) -> Vec<MediaId> {
    let mut sorted = group.to_vec();
    sorted.sort_unstable();
    sorted
}

/// Deduplicate groups that are permutations of each other.
#[must_use]
pub fn filter_groups(groups: Vec<Vec<MediaId>>) -> Vec<Vec<MediaId>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for g in groups {
        let key = canonical_key(&g);
        if seen.insert(key) {
            out.push(g);
        }
    }
    out
}

/// Coalesce groups sharing an element into connected components, up to `n`
/// merge steps (0 = unbounded).
#[must_use]
pub fn merge_groups(groups: Vec<Vec<MediaId>>, n: usize) -> Vec<Vec<MediaId>> {
    let mut parent: HashMap<MediaId, MediaId> = HashMap::new();
    fn find(parent: &mut HashMap<MediaId, MediaId>, x: MediaId) -> MediaId {
        let p = *parent.get(&x).unwrap_or(&x);
        if p == x {
            x
        } else {
            let root = find(parent, p);
            parent.insert(x, root);
            root
        }
    }
    fn union(parent: &mut HashMap<MediaId, MediaId>, a: MediaId, b: MediaId, steps: &mut usize, cap: usize) {
        if cap != 0 && *steps >= cap {
            return;
        }
        let (ra, rb) = (find(parent, a), find(parent, b));
        if ra != rb {
            parent.insert(ra, rb);
            *steps += 1;
        }
    }

    let mut steps = 0;
    for g in &groups {
        for &id in g {
            parent.entry(id).or_insert(id);
        }
        for w in g.windows(2) {
            union(&mut parent, w[0], w[1], &mut steps, n);
        }
    }

    let mut clusters: HashMap<MediaId, Vec<MediaId>> = HashMap::new();
    for &id in parent.keys().collect::<Vec<_>>() {
        let root = find(&mut parent, id);
        clusters.entry(root).or_default().push(id);
    }
    let mut out: Vec<Vec<MediaId>> = clusters.into_values().collect();
    for g in &mut out {
        g.sort_unstable();
    }
    out.sort();
    out
}

/// Explode `{a,b,c,d}` into pairs `{a,b},{a,c},{a,d}`, anchored on the
/// first element, in order.
#[must_use]
pub fn expand_groups(group: &[MediaId]) -> Vec<Vec<MediaId>> {
    let Some((anchor, rest)) = group.split_first() else { return Vec::new() };
    rest.iter().map(|&id| vec![*anchor, id]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_groups_collapses_permutations() {
        let groups = vec![vec![1, 2, 3], vec![1, 2, 3], vec![2, 3, 1]];
        assert_eq!(filter_groups(groups).len(), 1);
    }

    #[test]
    fn expand_groups_produces_pairs_anchored_on_first() {
        let expanded = expand_groups(&[1, 2, 3, 4]);
        assert_eq!(expanded, vec![vec![1, 2], vec![1, 3], vec![1, 4]]);
    }

    #[test]
    fn merge_groups_coalesces_shared_elements() {
        let groups = vec![vec![1, 2], vec![2, 3], vec![4, 5]];
        let merged = merge_groups(groups, 0);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|g| g.contains(&1) && g.contains(&3)));
    }

    #[test]
    fn min_matches_discards_whole_set() {
        let results = vec![make_media(1), make_media(2)];
        assert!(apply_min_matches(results, 3).is_empty());
    }

    #[test]
    fn match_flags_detect_bigger_dims_and_file() {
        let mut needle = make_media(1);
        needle.width = 100;
        needle.height = 100;
        needle.file_size = 1000;
        let mut candidate = make_media(2);
        candidate.width = 200;
        candidate.height = 200;
        candidate.file_size = 5000;
        let flags = compute_match_flags(&needle, &candidate);
        assert!(flags.contains(MatchFlags::BIGGER_DIMS));
        assert!(flags.contains(MatchFlags::BIGGER_FILE));
    }

    fn make_media(id: MediaId) -> Media {
        let mut m = Media::new(std::path::PathBuf::from(format!("/m{id}")), media_dedup_common::MediaType::Image);
        m.id = id;
        m
    }
}
