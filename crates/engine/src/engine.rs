//! The engine (§4.H): owns the store, the scanner, and every index
//! backend; exposes `query()` and `update()`.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::filter;
use media_dedup_common::{Digest, Media, MediaId, MediaType};
use media_dedup_index::{Algo, Index, Match, SearchParams};
use media_dedup_processor::{index_image, FrameSource, ImageOptions, VideoOptions};
use media_dedup_scanner::{scan, CancellationToken, ScanJob, ScanParams};
use media_dedup_store::{NegativeMatchMap, Store, WeedMap};
use media_dedup_video_index::VideoIndex;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Optional factory handed a video path and expected to return a decoded
/// frame source; `update()` skips video jobs with a warning if none is
/// configured (video decode is out of this crate's scope, §1).
pub type VideoSourceFactory = Box<dyn Fn(&Path) -> Box<dyn FrameSource> + Send + Sync>;

pub struct Engine {
    pub root: PathBuf,
    pub config: EngineConfig,
    pub store: Store,
    indices: RwLock<HashMap<Algo, Box<dyn Index>>>,
    pub negative_match: NegativeMatchMap,
    pub weed: WeedMap,
    progress: Mutex<HashMap<PathBuf, f32>>,
    cancel: CancellationToken,
    video_source_factory: Option<VideoSourceFactory>,
}

impl Engine {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Engine {
            root: root.into(),
            config,
            store: Store::new(),
            indices: RwLock::new(HashMap::new()),
            negative_match: NegativeMatchMap::new(),
            weed: WeedMap::new(),
            progress: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            video_source_factory: None,
        }
    }

    pub fn set_video_source_factory(&mut self, factory: VideoSourceFactory) {
        self.video_source_factory = Some(factory);
    }

    pub fn install_index(&self, algo: Algo, index: Box<dyn Index>) {
        self.indices.write().unwrap().insert(algo, index);
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn progress_snapshot(&self) -> HashMap<PathBuf, f32> {
        self.progress.lock().unwrap().clone()
    }

    /// `query(search) -> search` (§4.H). Returns the decorated matches;
    /// the needle itself is mutated in place to adopt the first match's
    /// `src_in` into its own `match_range.dst_in`.
    pub fn query(&self, needle: &mut Media, params: &SearchParams) -> Result<Vec<Media>> {
        if let Some(t) = needle.media_type {
            if params.query_types & t.flag() == 0 {
                return Ok(Vec::new());
            }
        }

        if let Some(digest) = needle.digest {
            needle.is_weed = self.weed.is_weed_key(digest);
        }

        let indices = self.indices.read().unwrap();
        let index = indices.get(&params.algo).ok_or(EngineError::NoIndex)?;

        let mut raw = self.store.similar_to(needle, params, index.as_ref());
        for mirror_bit in 0..3u8 {
            if params.mirror_mask & (1 << mirror_bit) != 0 {
                if let Some(mirrored) = mirror_needle(needle, mirror_bit) {
                    raw.extend(self.store.similar_to(&mirrored, params, index.as_ref()));
                }
            }
        }

        let mut results = self.resolve_matches(&raw, params.result_types);
        for m in &mut results {
            m.match_flags = filter::compute_match_flags(needle, m);
        }

        results = filter::filter_path(results, params);
        if params.filter_parent {
            results = filter::filter_parent(results, &needle.path);
        }
        if params.negative_match {
            results = filter::filter_negative_match(results, needle, &self.negative_match);
        }
        results = filter::tag_weed(results, &self.weed);
        if params.filter_self {
            results = filter::filter_self(results, needle.id);
        }
        results = filter::apply_min_matches(results, params.min_matches);

        results.sort_by_key(|m| m.score);
        if let Some(first) = results.first() {
            needle.match_range.dst_in = first.match_range.src_in;
        }
        needle.pixels = None;

        Ok(results)
    }

    fn resolve_matches(&self, raw: &[Match], result_types: u32) -> Vec<Media> {
        raw.iter()
            .filter_map(|m| {
                let mut media = self.store.media_with_id(m.media_id)?;
                if let Some(t) = media.media_type {
                    if result_types & t.flag() == 0 {
                        return None;
                    }
                }
                media.score = m.score;
                media.match_range.src_in = m.src_in;
                media.match_range.dst_in = m.dst_in;
                media.match_range.len = m.len;
                Some(media)
            })
            .collect()
    }

    /// `update(wait)` (§4.H): scan the root, process new/changed files,
    /// batch-commit, and remove stale paths.
    pub fn update(&self) -> Result<UpdateStats> {
        let indexed = self.store.indexed_files();
        let scan_params = ScanParams {
            write_batch_size: self.config.write_batch_size,
            index_threads: self.config.index_threads,
            dedup_by_inode: self.config.dedup_by_inode,
            resolve_symlinks: self.config.resolve_symlinks,
            cost_estimation: self.config.cost_estimation,
            last_scan: None,
        };
        let jobs = scan(&self.root, &scan_params, &indexed)?;

        let mut added = Vec::new();
        let mut video_indices: Vec<(PathBuf, VideoIndex)> = Vec::new();
        let mut skipped_videos = 0usize;
        for job in &jobs {
            if self.cancel.is_cancelled() {
                break;
            }
            match job.media_type {
                MediaType::Image => {
                    let result = index_image(&job.path, &ImageOptions::default());
                    if result.ok {
                        if let Some(mut media) = result.media {
                            media.file_size = job.cost;
                            added.push(media);
                        }
                    }
                }
                MediaType::Video => {
                    if let Some((media, video_index)) = self.process_video_job(job) {
                        video_indices.push((media.path.clone(), video_index));
                        added.push(media);
                    } else {
                        skipped_videos += 1;
                    }
                }
                MediaType::Audio => {}
            }
        }

        let added_count = added.len();
        let ids = self.store.add(added)?;
        {
            let media: Vec<Media> = ids.iter().filter_map(|&id| self.store.media_with_id(id)).collect();
            let mut indices = self.indices.write().unwrap();
            for idx in indices.values_mut() {
                idx.add(&media);
            }
            if let Some(video_idx) = indices.get_mut(&Algo::Video) {
                if let Some(video_idx) = video_idx.as_any_mut().downcast_mut::<media_dedup_index::VideoDctIndex>() {
                    for (path, video_index) in &video_indices {
                        if let Some(media_id) = media.iter().find(|m| &m.path == path).map(|m| m.id) {
                            video_idx.add_video(media_id, video_index, self.config.skip_frames);
                        }
                    }
                }
            }
        }

        let current_paths: std::collections::HashSet<PathBuf> = jobs.iter().map(|j| j.path.clone()).collect();
        let stale: Vec<MediaId> = self
            .store
            .indexed_files()
            .into_iter()
            .filter(|p| !current_paths.contains(p))
            .filter_map(|p| self.store.media_with_path_like(&p.to_string_lossy()).into_iter().map(|m| m.id).next())
            .collect();
        self.store.remove(&stale);

        Ok(UpdateStats { added: added_count, removed: stale.len(), skipped_videos })
    }

    fn process_video_job(&self, job: &ScanJob) -> Option<(Media, VideoIndex)> {
        let factory = self.video_source_factory.as_ref()?;
        let mut source = factory(&job.path);
        let bytes = std::fs::read(&job.path).ok()?;
        let vdx_path = job.path.with_extension("vdx");
        let result = media_dedup_processor::index_video(
            &job.path,
            &bytes,
            source.as_mut(),
            &VideoOptions { video_threshold: self.config.video_threshold, auto_crop: true },
            &vdx_path,
            &self.config.app_version,
        )
        .ok()?;
        let mut media = result.media?;
        media.file_size = job.cost;
        let video_index = result.video_index?;
        Some((media, video_index))
    }

    /// Verify every video's `.vdx` exists and is non-empty; broken records
    /// are removed and requeued (§4.H).
    #[must_use]
    pub fn verify_video_indices(&self) -> Vec<MediaId> {
        let mut broken = Vec::new();
        for media in self.store.media_with_predicate(|m| m.media_type == Some(MediaType::Video)) {
            let vdx_path = media.path.with_extension("vdx");
            let ok = std::fs::read(&vdx_path)
                .map(|bytes| media_dedup_video_index::VideoIndex::verify_bytes(&bytes))
                .unwrap_or(false);
            if !ok {
                broken.push(media.id);
            }
        }
        self.store.remove(&broken);
        broken
    }
}

#[derive(Debug, Default)]
pub struct UpdateStats {
    pub added: usize,
    pub removed: usize,
    pub skipped_videos: usize,
}

fn mirror_needle(needle: &Media, mirror_bit: u8) -> Option<Media> {
    let pixels = needle.pixels.as_ref()?;
    let (w, h) = (pixels.width as usize, pixels.height as usize);
    let mut flipped = pixels.gray.clone();
    match mirror_bit {
        0 => {
            for y in 0..h {
                flipped[y * w..(y + 1) * w].reverse();
            }
        }
        1 => {
            flipped.reverse();
        }
        _ => {
            for y in 0..h {
                flipped[y * w..(y + 1) * w].reverse();
            }
            flipped.reverse();
        }
    }
    let mut mirrored = needle.clone();
    mirrored.pixels = Some(media_dedup_common::DecodedImage { width: pixels.width, height: pixels.height, gray: flipped });
    Some(mirrored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_dedup_index::DctTreeIndex;
    use std::path::PathBuf;

    fn media(id: MediaId, hash: u64) -> Media {
        let mut m = Media::new(PathBuf::from(format!("/m{id}.png")), MediaType::Image);
        m.id = id;
        m.dct_hash = Some(hash);
        m
    }

    #[test]
    fn query_rejects_needle_of_excluded_type() {
        let engine = Engine::new("/root", EngineConfig::default());
        engine.install_index(Algo::Dct, Box::new(DctTreeIndex::new()));
        let mut needle = media(0, 42);
        needle.media_type = Some(MediaType::Video);
        let params = SearchParams { query_types: MediaType::Image.flag(), ..Default::default() };
        let results = engine.query(&mut needle, &params).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn query_finds_exact_dct_match() {
        let engine = Engine::new("/root", EngineConfig::default());
        let mut idx = DctTreeIndex::new();
        idx.add(&[media(1, 0xABCD)]);
        engine.install_index(Algo::Dct, Box::new(idx));
        engine.store.add(vec![media(1, 0xABCD)]).unwrap();

        let mut needle = media(0, 0xABCD);
        let params = SearchParams { dct_thresh: 0, filter_self: false, ..Default::default() };
        let results = engine.query(&mut needle, &params).unwrap();
        assert!(results.iter().any(|m| m.id == 1));
    }

    fn write_test_png(dir: &std::path::Path, name: &str) -> PathBuf {
        use image::{ImageBuffer, Rgb};
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 64]));
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn update_forwards_new_media_to_every_installed_index() {
        use media_dedup_index::ColorIndex;

        let dir = tempfile::tempdir().unwrap();
        write_test_png(dir.path(), "a.png");

        let engine = Engine::new(dir.path(), EngineConfig::default());
        engine.install_index(Algo::Dct, Box::new(DctTreeIndex::new()));
        engine.install_index(Algo::Color, Box::new(ColorIndex::new()));

        let stats = engine.update().unwrap();
        assert_eq!(stats.added, 1);

        let indices = engine.indices.read().unwrap();
        assert_eq!(indices[&Algo::Dct].count(), 1);
        assert_eq!(indices[&Algo::Color].count(), 1);
    }
}
