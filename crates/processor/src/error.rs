use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("open error on {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("format error on {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("cancelled")]
    Cancelled,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("video index error: {0}")]
    VideoIndex(#[from] media_dedup_video_index::VdxError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
