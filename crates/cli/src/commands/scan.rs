//! `scan`: wraps `Engine::update` (§10.4).

use crate::error::{CommandError, Result};
use crate::support::load_config;
use clap::Args;
use media_dedup_engine::Engine;
use media_dedup_index::{Algo, DctTreeIndex};
use std::path::PathBuf;

#[derive(Args)]
pub struct ScanCommand {
    /// Directory to scan
    root: PathBuf,

    /// Optional YAML config file layered under CLI flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of index worker threads (overrides config and
    /// MEDIA_DEDUP_INDEX_THREADS)
    #[arg(long)]
    index_threads: Option<usize>,
}

impl ScanCommand {
    pub fn execute(self) -> Result<()> {
        if !self.root.exists() {
            return Err(CommandError::user(anyhow::anyhow!(
                "scan root does not exist: {}",
                self.root.display()
            )));
        }

        let config = load_config(self.config.as_deref(), self.index_threads)?;
        let engine = Engine::new(self.root.clone(), config);
        engine.install_index(Algo::Dct, Box::new(DctTreeIndex::new()));

        let stats = engine.update().map_err(CommandError::internal)?;
        println!(
            "scanned {}: added {}, removed {}, skipped {} videos (no decoder configured)",
            self.root.display(),
            stats.added,
            stats.removed,
            stats.skipped_videos
        );
        Ok(())
    }
}
