//! Directory scanner (§4.F): walks a root directory, applies change
//! detection and inode/symlink policy, expands archives, and emits an
//! ordered job queue for the processor to consume.

mod archive;
mod error;
mod job;

pub use archive::{is_archive_path, list_members, make_virtual_path, split_virtual_path, ARCHIVE_EXTENSIONS};
pub use error::{Result, ScanError};
pub use job::{batch_images, order_jobs, ScanJob, DEFAULT_WRITE_BATCH_SIZE};

use media_dedup_common::MediaType;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Checked by the decoder I/O wrapper at the next read boundary; `flush()`
/// sets it for every queued and in-flight job (§5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    pub write_batch_size: usize,
    pub index_threads: usize,
    pub dedup_by_inode: bool,
    pub resolve_symlinks: bool,
    pub cost_estimation: bool,
    /// Gate for change detection (§6 `last-added.txt`): files with mtime
    /// at or before this are assumed already indexed and are skipped.
    pub last_scan: Option<SystemTime>,
}

impl ScanParams {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let _ = root.into();
        ScanParams {
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            index_threads: 4,
            dedup_by_inode: true,
            resolve_symlinks: true,
            cost_estimation: true,
            last_scan: None,
        }
    }
}

fn media_type_of(path: &Path) -> Option<MediaType> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" => Some(MediaType::Image),
        "mp4" | "mkv" | "mov" | "avi" | "webm" => Some(MediaType::Video),
        _ => None,
    }
}

#[cfg(unix)]
fn inode_key(meta: &std::fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), meta.ino())
}

#[cfg(not(unix))]
fn inode_key(_meta: &std::fs::Metadata) -> (u64, u64) {
    (0, 0)
}

/// Walk `root` and emit an ordered job queue, honoring change detection,
/// inode dedup, and symlink/archive policy.
pub fn scan(root: &Path, params: &ScanParams, previously_indexed: &HashSet<PathBuf>) -> Result<Vec<ScanJob>> {
    let mut jobs = Vec::new();
    let mut seen_inodes: HashSet<(u64, u64)> = HashSet::new();

    for entry in WalkDir::new(root).follow_links(params.resolve_symlinks) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();

        if archive::is_archive_path(path) {
            enqueue_archive(path, &mut jobs, params, previously_indexed)?;
            continue;
        }

        let Some(media_type) = media_type_of(path) else { continue };

        let meta = entry.metadata()?;
        if params.dedup_by_inode {
            let key = inode_key(&meta);
            if !seen_inodes.insert(key) {
                continue;
            }
        }

        if should_skip_unchanged(path, &meta, params, previously_indexed) {
            continue;
        }

        jobs.push(ScanJob { path: path.to_path_buf(), media_type, cost: meta.len() });
    }

    Ok(order_jobs(jobs, params.cost_estimation))
}

fn should_skip_unchanged(
    path: &Path,
    meta: &std::fs::Metadata,
    params: &ScanParams,
    previously_indexed: &HashSet<PathBuf>,
) -> bool {
    if !previously_indexed.contains(path) {
        return false;
    }
    let Some(last_scan) = params.last_scan else { return false };
    match meta.modified() {
        Ok(mtime) => mtime <= last_scan,
        Err(_) => false,
    }
}

fn enqueue_archive(
    archive_path: &Path,
    jobs: &mut Vec<ScanJob>,
    params: &ScanParams,
    previously_indexed: &HashSet<PathBuf>,
) -> Result<()> {
    let meta = std::fs::metadata(archive_path)?;
    if let Some(last_scan) = params.last_scan {
        let all_members_indexed = previously_indexed
            .iter()
            .any(|p| p.to_string_lossy().starts_with(&format!("{}:", archive_path.display())));
        if let Ok(mtime) = meta.modified() {
            if mtime <= last_scan && all_members_indexed {
                return Ok(());
            }
        }
    }

    let members = archive::list_members(archive_path)?;
    for member in members {
        let Some(media_type) = media_type_of(Path::new(&member)) else { continue };
        let virtual_path = archive::make_virtual_path(archive_path, &member);
        jobs.push(ScanJob { path: PathBuf::from(virtual_path), media_type, cost: 0 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_finds_media_files_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::write(dir.path().join("b.mp4"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let params = ScanParams::new(dir.path());
        let jobs = scan(dir.path(), &params, &HashSet::new()).unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn unchanged_file_is_skipped_on_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        fs::write(&path, b"x").unwrap();

        let mut params = ScanParams::new(dir.path());
        params.last_scan = Some(SystemTime::now() + std::time::Duration::from_secs(60));
        let mut indexed = HashSet::new();
        indexed.insert(path.clone());

        let jobs = scan(dir.path(), &params, &indexed).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn cancellation_token_reflects_state() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn videos_queue_before_images_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.png"), b"x").unwrap();
        fs::write(dir.path().join("a.mp4"), b"xx").unwrap();
        let params = ScanParams::new(dir.path());
        let jobs = scan(dir.path(), &params, &HashSet::new()).unwrap();
        assert_eq!(jobs[0].media_type, MediaType::Video);
    }
}
