//! Layered configuration (§10.3): compiled-in defaults, overridable by a
//! config file and then CLI flags at the binary boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub write_batch_size: usize,
    pub index_threads: usize,
    pub gpu_threads: usize,
    pub dedup_by_inode: bool,
    pub resolve_symlinks: bool,
    pub cost_estimation: bool,
    pub skip_frames: usize,
    pub video_threshold: u32,
    pub video_radix: u32,
    pub app_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            write_batch_size: 1024,
            index_threads: 4,
            gpu_threads: 1,
            dedup_by_inode: true,
            resolve_symlinks: true,
            cost_estimation: true,
            skip_frames: 300,
            video_threshold: 3,
            video_radix: 10,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_literals() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.write_batch_size, 1024);
        assert_eq!(cfg.skip_frames, 300);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let cfg = EngineConfig::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let reloaded: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.write_batch_size, cfg.write_batch_size);
    }
}
