//! In-memory similarity-search indices (§4.D): one backend per hash family,
//! sharing a common trait contract so the engine can treat them uniformly.

mod color_index;
mod cv_index;
mod dct_tree;
mod hamming_tree;
mod radix;
mod video_index;

pub use color_index::ColorIndex;
pub use cv_index::CvFeatureIndex;
pub use dct_tree::DctTreeIndex;
pub use hamming_tree::HammingTreeIndex;
pub use radix::RadixMap;
pub use video_index::VideoDctIndex;

use media_dedup_common::{Media, MediaId, MediaType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cache file corrupt or wrong version: {0}")]
    CorruptCache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("needle is missing data required by algo {0:?}")]
    MissingNeedleData(Algo),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Which backend a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algo {
    Dct,
    DctFeatures,
    CvFeatures,
    Color,
    Video,
}

/// Full search parameter set (§4.H + §10.6). Threaded from the CLI/config
/// layer down into `Index::find` and the engine's query filter.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub algo: Algo,
    pub dct_thresh: u32,
    pub cv_thresh: u32,
    pub min_matches: usize,
    pub max_matches: usize,
    pub needle_features: usize,
    pub haystack_features: usize,
    pub mirror_mask: u8,
    /// Progressively relax `dct_thresh`/`cv_thresh` up to this cap if the
    /// first attempt finds nothing.
    pub max_thresh: u32,
    pub tm_thresh: u32,
    pub tm_scale_pct: u32,
    pub template_match: bool,
    pub negative_match: bool,
    pub auto_crop: bool,
    pub verbose: bool,
    pub path: Option<String>,
    pub in_path: Option<String>,
    pub set: Option<Vec<MediaId>>,
    pub in_set: bool,
    pub query_types: u32,
    pub result_types: u32,
    pub skip_frames: usize,
    pub min_frames_matched: usize,
    pub min_frames_near: u32,
    pub video_radix: u32,
    pub frame_margin: i32,
    pub filter_self: bool,
    pub filter_groups: bool,
    pub filter_parent: bool,
    pub expand_groups: bool,
    pub merge_groups: bool,
    pub progress_interval: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            algo: Algo::Dct,
            dct_thresh: 5,
            cv_thresh: 20,
            min_matches: 1,
            max_matches: 9999,
            needle_features: 40,
            haystack_features: 40,
            mirror_mask: 0,
            max_thresh: 5,
            tm_thresh: 15,
            tm_scale_pct: 100,
            template_match: false,
            negative_match: true,
            auto_crop: true,
            verbose: false,
            path: None,
            in_path: None,
            set: None,
            in_set: false,
            query_types: MediaType::Image.flag() | MediaType::Video.flag(),
            result_types: MediaType::Image.flag() | MediaType::Video.flag(),
            skip_frames: 300,
            min_frames_matched: 1,
            min_frames_near: 50,
            video_radix: 10,
            frame_margin: 30,
            filter_self: true,
            filter_groups: false,
            filter_parent: false,
            expand_groups: false,
            merge_groups: false,
            progress_interval: 250,
        }
    }
}

/// One raw match out of `Index::find`; lower `score` is better. The caller
/// (query filter, §4.I) is responsible for sorting and post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub media_id: MediaId,
    pub score: i32,
    pub src_in: i32,
    pub dst_in: i32,
    pub len: i32,
}

/// Shared contract for all five backends (§4.D).
pub trait Index: Send + Sync {
    fn id(&self) -> Algo;
    fn is_loaded(&self) -> bool;
    fn count(&self) -> usize;
    /// Approximate heap usage in bytes: sum of backing `Vec` capacities
    /// times element size (§10.6 — wired to real accounting, not stubbed).
    fn memory_usage(&self) -> usize;
    fn media_ids(&self) -> Vec<MediaId>;
    fn add(&mut self, group: &[Media]);
    fn remove(&mut self, ids: &[MediaId]);
    fn find(&self, needle: &Media, params: &SearchParams) -> Vec<Match>;
    fn find_index_data(&self, media: &mut Media) -> bool;
    fn slice(&self, ids: &std::collections::HashSet<MediaId>) -> Box<dyn Index>;
    /// Downcast hook so callers holding `Box<dyn Index>` can reach backend-
    /// specific methods not on this trait (e.g. `VideoDctIndex::add_video`,
    /// which needs a whole frame stream rather than a bare `Media`).
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
