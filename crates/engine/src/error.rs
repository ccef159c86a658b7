use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] media_dedup_store::StoreError),

    #[error("scan error: {0}")]
    Scan(#[from] media_dedup_scanner::ScanError),

    #[error("index error: {0}")]
    Index(#[from] media_dedup_index::IndexError),

    #[error("no index loaded for requested algo")]
    NoIndex,
}

pub type Result<T> = std::result::Result<T, EngineError>;
