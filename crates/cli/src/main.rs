//! Media dedup CLI - content-based duplicate and near-duplicate detection.

use clap::{Parser, Subcommand};
use media_dedup_cli::commands::neg::NegCommand;
use media_dedup_cli::commands::query::QueryCommand;
use media_dedup_cli::commands::scan::ScanCommand;
use media_dedup_cli::commands::verify::VerifyCommand;
use media_dedup_cli::commands::weed::WeedCommand;
use media_dedup_cli::error::CommandError;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "media-dedup",
    version,
    about = "Content-based media deduplication: perceptual-hash scan and query over images and video",
    after_help = "EXAMPLES:\n  \
                  media-dedup scan ./photos\n  \
                  media-dedup query ./photos needle.jpg --dct-thresh 8\n  \
                  media-dedup query ./photos needle.jpg --with \"width >= 1024\" --group-by path\n  \
                  media-dedup verify ./photos\n  \
                  media-dedup neg add <digest_a> <digest_b>\n  \
                  media-dedup weed add <deleted_digest> <canonical_digest>"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and update the index
    Scan(ScanCommand),
    /// Search for matches of a needle image within a directory
    Query(QueryCommand),
    /// Verify stored video indices are intact
    Verify(VerifyCommand),
    /// Manage the negative-match blacklist
    Neg(NegCommand),
    /// Manage the weed map
    Weed(WeedCommand),
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: failed to install tracing subscriber");
    }

    let result = match cli.command {
        Commands::Scan(cmd) => cmd.execute(),
        Commands::Query(cmd) => cmd.execute(),
        Commands::Verify(cmd) => cmd.execute(),
        Commands::Neg(cmd) => cmd.execute(),
        Commands::Weed(cmd) => cmd.execute(),
    };

    match result {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(exit_code(&err));
        }
    }
}

fn exit_code(err: &CommandError) -> i32 {
    err.kind.code()
}
