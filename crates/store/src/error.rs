use media_dedup_common::MediaId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("media {0} not found")]
    NotFound(MediaId),

    #[error("path already indexed: {0}")]
    DuplicatePath(PathBuf),

    #[error("archive members cannot be renamed or moved: {0}")]
    ArchiveMemberImmutable(PathBuf),

    #[error("concurrent writer detected on store at {0}")]
    ConcurrentWriter(PathBuf),

    #[error("weed map rejects self-reference or circular entry")]
    InvalidWeedEntry,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
