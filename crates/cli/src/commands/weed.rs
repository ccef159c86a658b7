//! `weed`: weed-map CRUD (§4.E, `weed.csv`).

use crate::error::{CommandError, Result};
use crate::support::parse_digest;
use clap::{Args, Subcommand};
use media_dedup_store::WeedMap;
use std::path::PathBuf;

#[derive(Args)]
pub struct WeedCommand {
    /// Path to weed.csv
    #[arg(long, default_value = "weed.csv")]
    file: PathBuf,

    #[command(subcommand)]
    action: WeedAction,
}

#[derive(Subcommand)]
enum WeedAction {
    /// Mark `deleted` as a weed, pointing at `canonical`
    Add { deleted: String, canonical: String },
    /// Unmark a digest as a weed
    Remove { digest: String },
    /// List all weed entries
    List,
}

impl WeedCommand {
    pub fn execute(self) -> Result<()> {
        let map = WeedMap::new();
        map.load(&self.file).map_err(CommandError::internal)?;

        match self.action {
            WeedAction::Add { deleted, canonical } => {
                let d = parse_digest(&deleted)?;
                let c = parse_digest(&canonical)?;
                if map.add_weed(d, c).map_err(CommandError::internal)? {
                    println!("recorded weed {deleted} -> {canonical}");
                } else {
                    return Err(CommandError::user(anyhow::anyhow!(
                        "rejected: {deleted} would self-reference or chain onto an existing weed"
                    )));
                }
            }
            WeedAction::Remove { digest } => {
                let d = parse_digest(&digest)?;
                map.remove_weed(d);
                println!("removed weed entry for {digest}");
            }
            WeedAction::List => {
                for (deleted, canonical) in map.weeds() {
                    println!("{deleted} -> {canonical}");
                }
            }
        }
        Ok(())
    }
}
