//! Shared data types and error taxonomy for the media deduplication engine.
//!
//! Every other crate in the workspace depends on this one for the `Media`
//! record, the `MediaId`/`MediaType` identifiers, and `CoreError`. Keeping
//! these in one place is what lets the scanner, the indices, and the engine
//! agree on what a "result" even is without importing each other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the core engine.
///
/// Most variants are recoverable at the scanner boundary: they are
/// accumulated in a per-file map rather than propagated (see `ErrorLog`
/// below). `ConcurrentWriter` and corrupt-index are the two variants the
/// caller is expected to react to directly.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("open error on {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("format error on {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("unsupported media type: {0}")]
    Unsupported(String),

    #[error("archive member failure in {archive}: {member}: {message}")]
    ArchiveMember {
        archive: PathBuf,
        member: String,
        message: String,
    },

    #[error("corrupt index file for media {0}")]
    CorruptIndex(MediaId),

    #[error("concurrent writer detected on store at {0}")]
    ConcurrentWriter(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Non-zero, monotonically assigned identifier. `0` means "not in store".
pub type MediaId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    /// Bit flag used by `SearchParams::query_types`/`result_types`.
    #[must_use]
    pub fn flag(self) -> u32 {
        match self {
            MediaType::Image => 1 << 0,
            MediaType::Video => 1 << 1,
            MediaType::Audio => 1 << 2,
        }
    }
}

/// 128-bit content digest (MD5 of the payload, per §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    #[must_use]
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// `match_flags` bitset from §3 / §10.6. Populated by the query filter when
/// assembling final results (needle vs. candidate comparison). A plain
/// newtype over `u32` rather than pulling in a bitflags crate for four bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchFlags(u32);

impl MatchFlags {
    pub const EXACT_DIGEST: MatchFlags = MatchFlags(1 << 0);
    pub const BIGGER_DIMS: MatchFlags = MatchFlags(1 << 1);
    pub const BIGGER_FILE: MatchFlags = MatchFlags(1 << 2);
    pub const LESS_COMPRESSED: MatchFlags = MatchFlags(1 << 3);

    #[must_use]
    pub fn contains(self, flag: MatchFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for MatchFlags {
    type Output = MatchFlags;
    fn bitor(self, rhs: MatchFlags) -> MatchFlags {
        MatchFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for MatchFlags {
    fn bitor_assign(&mut self, rhs: MatchFlags) {
        self.0 |= rhs.0;
    }
}

/// `(src_in, dst_in, len)`: an aligned segment between a needle frame window
/// and a candidate frame window. For image matches `len` is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchRange {
    pub src_in: i32,
    pub dst_in: i32,
    pub len: i32,
}

/// Decoded, decompressed image pixels: grayscale u8 buffer, row-major.
/// Used as the transient pixel data a query needle carries through
/// processing; never persisted.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub gray: Vec<u8>,
}

/// The media record (§3). Value-typed and freely copyable except for the
/// transient decoded buffer, which is `Option` so a record can be passed
/// around without it once it's no longer needed.
#[derive(Debug, Clone, Default)]
pub struct Media {
    // Immutable identity
    pub id: MediaId,
    pub media_type: Option<MediaType>,
    pub path: PathBuf,
    pub digest: Option<Digest>,
    pub width: u32,
    pub height: u32,
    pub dct_hash: Option<u64>,
    /// File size in bytes, used by the query filter to compute
    /// `BIGGER_FILE`/`LESS_COMPRESSED` match flags.
    pub file_size: u64,

    // Mutable decoration (post-query)
    pub score: i32,
    pub match_range: MatchRange,
    pub match_flags: MatchFlags,
    pub attributes: HashMap<String, String>,
    pub is_weed: bool,
    pub position: usize,

    // Index-feeding, computed by the processor
    /// Per-feature DCT hashes (§3 "keypoint hash list"); feature positions
    /// themselves are discarded once hashed.
    pub feature_hashes: Option<Vec<u64>>,
    pub color_descriptor: Option<media_dedup_color::ColorDescriptor>,
    /// Binary ORB descriptors, one 32-byte vector per detected keypoint.
    /// Consumed only by the template-match post-filter (§4.J); never
    /// persisted to the metadata store.
    pub orb_descriptors: Option<Vec<Vec<u8>>>,

    // Transient, query-scope-owned
    pub pixels: Option<DecodedImage>,
}

impl Media {
    #[must_use]
    pub fn new(path: PathBuf, media_type: MediaType) -> Self {
        Media {
            media_type: Some(media_type),
            path,
            ..Default::default()
        }
    }

    /// `mediaid == 0` <=> "not in store".
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.id != 0
    }
}

/// Per-file error accumulation (§7): "errors never propagate past the
/// scanner boundary". The scanner and processor push into this instead of
/// bubbling `CoreError` up through the job queue.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: HashMap<PathBuf, Vec<String>>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: PathBuf, kind: impl Into<String>) {
        self.entries.entry(path).or_default().push(kind.into());
    }

    #[must_use]
    pub fn for_path(&self, path: &std::path::Path) -> &[String] {
        self.entries.get(path).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_not_in_store_by_default() {
        let m = Media::new(PathBuf::from("/root/a.png"), MediaType::Image);
        assert!(!m.is_stored());
        assert_eq!(m.id, 0);
    }

    #[test]
    fn media_type_flags_are_distinct_bits() {
        assert_eq!(MediaType::Image.flag(), 1);
        assert_eq!(MediaType::Video.flag(), 2);
        assert_eq!(MediaType::Audio.flag(), 4);
    }

    #[test]
    fn digest_hex_roundtrips_length() {
        let d = Digest([0u8; 16]);
        assert_eq!(d.to_hex().len(), 32);
    }

    #[test]
    fn error_log_accumulates_per_path() {
        let mut log = ErrorLog::new();
        log.record(PathBuf::from("/a"), "format-error");
        log.record(PathBuf::from("/a"), "open-error");
        assert_eq!(log.for_path(std::path::Path::new("/a")).len(), 2);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn match_flags_combine() {
        let f = MatchFlags::EXACT_DIGEST | MatchFlags::BIGGER_DIMS;
        assert!(f.contains(MatchFlags::EXACT_DIGEST));
        assert!(f.contains(MatchFlags::BIGGER_DIMS));
        assert!(!f.contains(MatchFlags::LESS_COMPRESSED));
    }
}
