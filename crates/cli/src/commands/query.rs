//! `query`: wraps `Engine::query`, with `-with`/`-without`/`-group-by`
//! expressions parsed by the §4.K interpreter (§10.4).
//!
//! The metadata store is process-local (§9: no relational backend), so
//! `query` scans `root` itself before searching rather than assuming a
//! prior `scan` run populated a persisted store.

use crate::error::{CommandError, Result};
use crate::support::load_config;
use clap::Args;
use media_dedup_engine::Engine;
use media_dedup_expr::{group_by, Expression, PropertyPath};
use media_dedup_index::{Algo, DctTreeIndex, SearchParams};
use media_dedup_processor::{process_image, ImageOptions};
use std::path::PathBuf;

#[derive(Args)]
pub struct QueryCommand {
    /// Directory to scan and search within
    root: PathBuf,

    /// Image file to search for matches of
    needle: PathBuf,

    /// Optional YAML config file layered under CLI flags
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    index_threads: Option<usize>,

    /// Maximum DCT Hamming distance to accept as a match
    #[arg(long, default_value_t = 5)]
    dct_thresh: u32,

    /// Keep only results matching this expression (repeatable, all must hold)
    #[arg(long = "with", value_name = "EXPR")]
    with_exprs: Vec<String>,

    /// Drop results matching this expression (repeatable, any drops the result)
    #[arg(long = "without", value_name = "EXPR")]
    without_exprs: Vec<String>,

    /// Bucket results by this property path before printing
    #[arg(long = "group-by", value_name = "PATH")]
    group_by: Option<String>,

    /// Print only matched file paths (for piping into xargs)
    #[arg(long)]
    select_files: bool,
}

impl QueryCommand {
    pub fn execute(self) -> Result<()> {
        if !self.needle.exists() {
            return Err(CommandError::user(anyhow::anyhow!(
                "needle file does not exist: {}",
                self.needle.display()
            )));
        }

        let config = load_config(self.config.as_deref(), self.index_threads)?;
        let engine = Engine::new(&self.root, config);
        engine.install_index(Algo::Dct, Box::new(DctTreeIndex::new()));
        engine.update().map_err(CommandError::internal)?;

        let mut needle = process_image(&self.needle, &ImageOptions::default())
            .map_err(|e| CommandError::user(anyhow::anyhow!("failed to process needle: {e}")))?;

        let params = SearchParams { algo: Algo::Dct, dct_thresh: self.dct_thresh, ..Default::default() };
        let mut results = engine.query(&mut needle, &params).map_err(CommandError::internal)?;

        for expr_str in &self.with_exprs {
            let expr = Expression::parse(expr_str).map_err(|e| CommandError::user(anyhow::anyhow!("{e}")))?;
            results.retain(|m| expr.matches(m).unwrap_or(false));
        }
        for expr_str in &self.without_exprs {
            let expr = Expression::parse(expr_str).map_err(|e| CommandError::user(anyhow::anyhow!("{e}")))?;
            results.retain(|m| !expr.matches(m).unwrap_or(false));
        }

        if let Some(group_path) = &self.group_by {
            let path = PropertyPath::parse(group_path).map_err(|e| CommandError::user(anyhow::anyhow!("{e}")))?;
            for (key, group) in group_by(&path, results) {
                println!("[{key}]");
                print_results(&group, self.select_files);
            }
        } else {
            print_results(&results, self.select_files);
        }

        Ok(())
    }
}

fn print_results(results: &[media_dedup_common::Media], select_files: bool) {
    for m in results {
        if select_files {
            println!("{}", m.path.display());
        } else {
            println!("{}\tscore={}", m.path.display(), m.score);
        }
    }
}
