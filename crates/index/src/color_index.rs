//! D4: linear scan over color descriptors (§4.D). Acceptable because corpus
//! sizes where color search is useful are modest.

use crate::{Algo, Index, Match, SearchParams};
use media_dedup_color::{distance, ColorDescriptor};
use media_dedup_common::{Media, MediaId};
use std::collections::HashSet;

pub struct ColorIndex {
    media_ids: Vec<MediaId>,
    descriptors: Vec<ColorDescriptor>,
}

impl ColorIndex {
    #[must_use]
    pub fn new() -> Self {
        ColorIndex { media_ids: Vec::new(), descriptors: Vec::new() }
    }
}

impl Default for ColorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Index for ColorIndex {
    fn id(&self) -> Algo {
        Algo::Color
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
            .map(|d| d.entries.capacity() * std::mem::size_of::<media_dedup_color::ColorEntry>())
            .sum::<usize>()
            + self.media_ids.capacity() * 4
    }

    fn media_ids(&self) -> Vec<MediaId> {
        self.media_ids.iter().copied().filter(|&id| id != 0).collect()
    }

    fn add(&mut self, group: &[Media]) {
        for m in group {
            let Some(desc) = &m.color_descriptor else { continue };
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
        let Some(needle_desc) = &needle.color_descriptor else {
            return Vec::new();
        };
        let mut out: Vec<Match> = self
            .media_ids
            .iter()
            .enumerate()
            .filter(|&(_, &id)| id != 0)
            .map(|(i, &id)| {
                let d = distance(needle_desc, &self.descriptors[i]);
                Match {
                    media_id: id,
                    score: d.round() as i32,
                    src_in: 0,
                    dst_in: 0,
                    len: 1,
                }
            })
            .collect();
        out.sort_by_key(|m| m.score);
        out.truncate(params.max_matches);
        out
    }

    fn find_index_data(&self, media: &mut Media) -> bool {
        if let Some(pos) = self.media_ids.iter().position(|&id| id == media.id) {
            media.color_descriptor = Some(self.descriptors[pos].clone());
            true
        } else {
            false
        }
    }

    fn slice(&self, ids: &HashSet<MediaId>) -> Box<dyn Index> {
        let mut sliced = ColorIndex::new();
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
    use media_dedup_color::ColorEntry;
    use std::path::PathBuf;

    fn media_with_color(id: MediaId, l: u16) -> Media {
        let mut m = Media::new(PathBuf::from(format!("/m{id}")), media_dedup_common::MediaType::Image);
        m.id = id;
        m.color_descriptor = Some(ColorDescriptor {
            entries: vec![ColorEntry { l, u: 30000, v: 30000, weight: u16::MAX }],
        });
        m
    }

    #[test]
    fn closest_color_scores_lowest() {
        let mut idx = ColorIndex::new();
        idx.add(&[media_with_color(1, 10_000), media_with_color(2, 60_000)]);
        let hits = idx.find(&media_with_color(0, 10_100), &SearchParams::default());
        assert_eq!(hits[0].media_id, 1);
    }

    #[test]
    fn removed_entries_excluded() {
        let mut idx = ColorIndex::new();
        idx.add(&[media_with_color(1, 1000)]);
        idx.remove(&[1]);
        let hits = idx.find(&media_with_color(0, 1000), &SearchParams::default());
        assert!(hits.is_empty());
    }
}
