//! The query engine (§4.H) and its pre/post result filter (§4.I).

mod config;
mod engine;
mod error;
mod filter;

pub use config::EngineConfig;
pub use engine::{Engine, UpdateStats, VideoSourceFactory};
pub use error::{EngineError, Result};
pub use filter::{
    apply_min_matches, compute_match_flags, expand_groups, filter_groups, filter_negative_match,
    filter_parent, filter_path, filter_self, merge_groups, tag_weed,
};
