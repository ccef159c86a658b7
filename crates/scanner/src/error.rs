use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("open error on {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive member failure in {archive}: {member}: {message}")]
    ArchiveMember {
        archive: PathBuf,
        member: String,
        message: String,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
