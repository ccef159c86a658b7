//! Job queue discipline (§4.F): videos first, longest-job-first when cost
//! estimation is enabled; images batched afterward.

use media_dedup_common::MediaType;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ScanJob {
    pub path: PathBuf,
    pub media_type: MediaType,
    /// Rough cost proxy (bytes on disk) used for longest-job-first
    /// ordering when full probing isn't done up front.
    pub cost: u64,
}

pub const DEFAULT_WRITE_BATCH_SIZE: usize = 1024;

/// Order jobs per §4.F: videos queue first (longest-job-first by `cost` if
/// `cost_estimation` is set), then images.
#[must_use]
pub fn order_jobs(mut jobs: Vec<ScanJob>, cost_estimation: bool) -> Vec<ScanJob> {
    let (mut videos, mut images): (Vec<ScanJob>, Vec<ScanJob>) =
        jobs.drain(..).partition(|j| j.media_type == MediaType::Video);
    if cost_estimation {
        videos.sort_by(|a, b| b.cost.cmp(&a.cost));
    }
    let mut ordered = Vec::with_capacity(videos.len() + images.len());
    ordered.append(&mut videos);
    ordered.append(&mut images);
    ordered
}

/// Split the image tail into batches of `batch_size` so commits land in
/// chunks that hide write latency (§4.F).
#[must_use]
pub fn batch_images(images: &[ScanJob], batch_size: usize) -> Vec<&[ScanJob]> {
    if batch_size == 0 {
        return vec![images];
    }
    images.chunks(batch_size).collect()
}
