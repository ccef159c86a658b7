//! `neg`: negative-match blacklist CRUD (§4.E, `neg.csv`).

use crate::error::{CommandError, Result};
use crate::support::parse_digest;
use clap::{Args, Subcommand};
use media_dedup_store::NegativeMatchMap;
use std::path::PathBuf;

#[derive(Args)]
pub struct NegCommand {
    /// Path to neg.csv
    #[arg(long, default_value = "neg.csv")]
    file: PathBuf,

    #[command(subcommand)]
    action: NegAction,
}

#[derive(Subcommand)]
enum NegAction {
    /// Record that two digests are a known false-positive pair
    Add { digest_a: String, digest_b: String },
    /// List all recorded negative-match pairs
    List,
}

impl NegCommand {
    pub fn execute(self) -> Result<()> {
        let map = NegativeMatchMap::new();
        map.load(&self.file).map_err(CommandError::internal)?;

        match self.action {
            NegAction::Add { digest_a, digest_b } => {
                let a = parse_digest(&digest_a)?;
                let b = parse_digest(&digest_b)?;
                map.add_negative_match(a, b).map_err(CommandError::internal)?;
                println!("recorded negative match {digest_a} <-> {digest_b}");
            }
            NegAction::List => {
                println!("{} negative-match pair(s)", map.len());
            }
        }
        Ok(())
    }
}
