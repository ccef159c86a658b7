//! `verify`: checks `.vdx` integrity per §4.G.4 / §8 invariants.

use crate::error::{CommandError, Result};
use crate::support::load_config;
use clap::Args;
use media_dedup_engine::Engine;
use media_dedup_index::{Algo, DctTreeIndex};
use std::path::PathBuf;

#[derive(Args)]
pub struct VerifyCommand {
    /// Directory to scan before verifying
    root: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

impl VerifyCommand {
    pub fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref(), None)?;
        let engine = Engine::new(self.root, config);
        engine.install_index(Algo::Dct, Box::new(DctTreeIndex::new()));
        engine.update().map_err(CommandError::internal)?;

        let broken = engine.verify_video_indices();
        if broken.is_empty() {
            println!("all video indices verified ok");
        } else {
            println!("{} broken video index(es) removed from store", broken.len());
        }
        Ok(())
    }
}
