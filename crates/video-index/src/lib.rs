//! Persistent video-index file format (§4.B): the `.vdx` sidecar holding the
//! frame-number/hash stream for one video.
//!
//! Two on-disk versions coexist. `load` auto-detects by magic bytes; new
//! files are always written as v2. v1 support exists purely for reading
//! files produced by an older build.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Hard cap on frames retained per video, regardless of format. The loader
/// drops extras with a warning rather than failing (§4.B).
pub const MAX_FRAMES_PER_VIDEO: usize = 200_000;

const V1_FRAME_LIMIT: usize = u16::MAX as usize;
const V2_MAGIC: &[u8; 5] = b"cbird";
const V2_TRAILER: &[u8; 4] = b"cbir";

#[derive(Debug, Error)]
pub enum VdxError {
    #[error("truncated video index file ({0} bytes)")]
    Truncated(usize),

    #[error("unrecognized video index header")]
    BadMagic,

    #[error("byte order mismatch: file is {file}, host is {host}")]
    ByteOrderMismatch { file: String, host: String },

    #[error("missing or corrupt trailer")]
    BadTrailer,

    #[error("v1 format cannot hold {0} frames (limit {V1_FRAME_LIMIT})")]
    TooManyFramesForV1(usize),

    #[error("frames must start at 0 and be strictly increasing")]
    InvalidFrameSequence,

    #[error("frames and hashes length mismatch: {frames} vs {hashes}")]
    LengthMismatch { frames: usize, hashes: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VdxError>;

/// One video's frame-hash stream. `frames` is strictly increasing with
/// `frames[0] == 0`; `hashes` is parallel to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoIndex {
    pub frames: Vec<i32>,
    pub hashes: Vec<u64>,
}

impl VideoIndex {
    #[must_use]
    pub fn new(frames: Vec<i32>, hashes: Vec<u64>) -> Self {
        VideoIndex { frames, hashes }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frames.len() != self.hashes.len() {
            return Err(VdxError::LengthMismatch {
                frames: self.frames.len(),
                hashes: self.hashes.len(),
            });
        }
        if self.frames.is_empty() {
            return Ok(());
        }
        if self.frames[0] != 0 {
            return Err(VdxError::InvalidFrameSequence);
        }
        if self.frames.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VdxError::InvalidFrameSequence);
        }
        Ok(())
    }

    /// Encode as v1: `u16 num_frames | u16[n] frame_numbers | u64[n] hashes`,
    /// little-endian. Fails if the frame count exceeds the 16-bit limit.
    pub fn encode_v1(&self) -> Result<Vec<u8>> {
        self.validate()?;
        if self.frames.len() > V1_FRAME_LIMIT {
            return Err(VdxError::TooManyFramesForV1(self.frames.len()));
        }
        let mut out = Vec::with_capacity(2 + self.frames.len() * 2 + self.hashes.len() * 8);
        let mut buf16 = [0u8; 2];
        LittleEndian::write_u16(&mut buf16, self.frames.len() as u16);
        out.extend_from_slice(&buf16);
        for &f in &self.frames {
            LittleEndian::write_u16(&mut buf16, f as u16);
            out.extend_from_slice(&buf16);
        }
        let mut buf64 = [0u8; 8];
        for &h in &self.hashes {
            LittleEndian::write_u64(&mut buf64, h);
            out.extend_from_slice(&buf64);
        }
        Ok(out)
    }

    /// Encode as v2 (ASCII header + varint frame deltas + 8-byte-aligned
    /// hash block + ASCII trailer). `app_version` is embedded verbatim in
    /// the header for diagnostics; it is not interpreted on load.
    pub fn encode_v2(&self, app_version: &str) -> Result<Vec<u8>> {
        self.validate()?;

        let packed = encode_frame_deltas(&self.frames);
        let header = format!(
            "cbird video index:{app_version}:2:{order}:1:8:{n}:\n",
            order = host_byte_order(),
            n = self.frames.len(),
        );

        let mut out = Vec::new();
        out.extend_from_slice(header.as_bytes());

        let mut len_buf = [0u8; 4];
        LittleEndian::write_u32(&mut len_buf, packed.len() as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&packed);

        let unaligned = out.len();
        let aligned = (unaligned + 7) & !7;
        out.resize(aligned, 0);

        let mut buf64 = [0u8; 8];
        for &h in &self.hashes {
            LittleEndian::write_u64(&mut buf64, h);
            out.extend_from_slice(&buf64);
        }
        out.extend_from_slice(V2_TRAILER);
        Ok(out)
    }

    /// Decode either format, auto-detected by the first 5 bytes.
    pub fn decode(bytes: &[u8]) -> Result<VideoIndex> {
        if bytes.len() >= V2_MAGIC.len() && &bytes[..V2_MAGIC.len()] == V2_MAGIC {
            decode_v2(bytes)
        } else {
            decode_v1(bytes)
        }
    }

    /// Load from a path, detecting format automatically.
    pub fn load(path: &Path) -> Result<VideoIndex> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Write atomically: encode v2, write to a temp file in the same
    /// directory, then rename over the destination.
    pub fn save_atomic(&self, path: &Path, app_version: &str) -> Result<()> {
        let bytes = self.encode_v2(app_version)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(path).map_err(|e| VdxError::Io(e.into_error()))?;
        Ok(())
    }

    /// True iff the file exists, is non-empty, and its trailer (v2) or
    /// overall byte length (v1) checks out. Truncated files fail this
    /// check without panicking.
    #[must_use]
    pub fn verify_bytes(bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        if bytes.len() >= V2_MAGIC.len() && &bytes[..V2_MAGIC.len()] == V2_MAGIC {
            bytes.len() >= V2_TRAILER.len() && &bytes[bytes.len() - 4..] == V2_TRAILER
        } else {
            decode_v1(bytes).is_ok()
        }
    }
}

fn host_byte_order() -> &'static str {
    if cfg!(target_endian = "little") {
        "le"
    } else {
        "be"
    }
}

fn encode_frame_deltas(frames: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev = 0i64;
    for (i, &f) in frames.iter().enumerate() {
        let delta = if i == 0 { 0 } else { i64::from(f) - prev };
        encode_varint(delta as u64, &mut out);
        prev = i64::from(f);
    }
    out
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

fn decode_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Some(result)
}

fn decode_v1(bytes: &[u8]) -> Result<VideoIndex> {
    if bytes.len() < 2 {
        return Err(VdxError::Truncated(bytes.len()));
    }
    let num_frames = LittleEndian::read_u16(&bytes[0..2]) as usize;
    let frames_end = 2 + num_frames * 2;
    let hashes_end = frames_end + num_frames * 8;
    if bytes.len() < hashes_end {
        return Err(VdxError::Truncated(bytes.len()));
    }

    let mut frames = Vec::with_capacity(num_frames.min(MAX_FRAMES_PER_VIDEO));
    for i in 0..num_frames {
        if frames.len() >= MAX_FRAMES_PER_VIDEO {
            tracing::warn!(dropped = num_frames - frames.len(), "v1 vdx exceeds MAX_FRAMES_PER_VIDEO, truncating");
            break;
        }
        let off = 2 + i * 2;
        frames.push(i32::from(LittleEndian::read_u16(&bytes[off..off + 2])));
    }
    let mut hashes = Vec::with_capacity(frames.len());
    for i in 0..frames.len() {
        let off = frames_end + i * 8;
        hashes.push(LittleEndian::read_u64(&bytes[off..off + 8]));
    }

    let index = VideoIndex { frames, hashes };
    index.validate()?;
    Ok(index)
}

fn decode_v2(bytes: &[u8]) -> Result<VideoIndex> {
    let header_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(VdxError::BadMagic)?;
    let header = std::str::from_utf8(&bytes[..header_end]).map_err(|_| VdxError::BadMagic)?;
    let fields: Vec<&str> = header.split(':').collect();
    // "cbird video index", app-version, "2", byte-order, "1", "8", num_frames, ""
    if fields.len() < 8 || fields[0] != "cbird video index" {
        return Err(VdxError::BadMagic);
    }
    let file_order = fields[3];
    let host_order = host_byte_order();
    if file_order != host_order {
        return Err(VdxError::ByteOrderMismatch {
            file: file_order.to_string(),
            host: host_order.to_string(),
        });
    }
    let num_frames: usize = fields[6].parse().map_err(|_| VdxError::BadMagic)?;

    let mut pos = header_end + 1;
    if bytes.len() < pos + 4 {
        return Err(VdxError::Truncated(bytes.len()));
    }
    let packed_len = LittleEndian::read_u32(&bytes[pos..pos + 4]) as usize;
    pos += 4;
    if bytes.len() < pos + packed_len {
        return Err(VdxError::Truncated(bytes.len()));
    }
    let packed = &bytes[pos..pos + packed_len];
    pos += packed_len;
    let aligned = (pos + 7) & !7;
    if bytes.len() < aligned {
        return Err(VdxError::Truncated(bytes.len()));
    }
    pos = aligned;

    let kept_frames = num_frames.min(MAX_FRAMES_PER_VIDEO);
    if kept_frames < num_frames {
        tracing::warn!(dropped = num_frames - kept_frames, "v2 vdx exceeds MAX_FRAMES_PER_VIDEO, truncating");
    }

    let hashes_end = pos + kept_frames * 8;
    if bytes.len() < hashes_end + V2_TRAILER.len() {
        return Err(VdxError::Truncated(bytes.len()));
    }
    if &bytes[bytes.len() - 4..] != V2_TRAILER {
        return Err(VdxError::BadTrailer);
    }

    let mut frame_pos = 0usize;
    let mut running = 0i64;
    let mut frames = Vec::with_capacity(kept_frames);
    for _ in 0..kept_frames {
        let delta = decode_varint(packed, &mut frame_pos).ok_or(VdxError::Truncated(bytes.len()))?;
        running += delta as i64;
        frames.push(running as i32);
    }

    let mut hashes = Vec::with_capacity(kept_frames);
    for i in 0..kept_frames {
        let off = pos + i * 8;
        hashes.push(LittleEndian::read_u64(&bytes[off..off + 8]));
    }

    let index = VideoIndex { frames, hashes };
    index.validate()?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VideoIndex {
        VideoIndex::new(vec![0, 15, 45, 123_456], vec![1, 2, 3, 4])
    }

    #[test]
    fn v2_roundtrip() {
        let idx = sample();
        let bytes = idx.encode_v2("1.0").unwrap();
        let decoded = VideoIndex::decode(&bytes).unwrap();
        assert_eq!(idx, decoded);
    }

    #[test]
    fn v2_starts_with_magic_and_ends_with_trailer() {
        let idx = sample();
        let bytes = idx.encode_v2("1.0").unwrap();
        assert!(bytes.starts_with(b"cbird video index:"));
        assert!(bytes.ends_with(b"cbir"));
    }

    #[test]
    fn v1_roundtrip() {
        let idx = VideoIndex::new(vec![0, 3, 9], vec![10, 20, 30]);
        let bytes = idx.encode_v1().unwrap();
        let decoded = VideoIndex::decode(&bytes).unwrap();
        assert_eq!(idx, decoded);
    }

    #[test]
    fn v1_to_v2_roundtrip_preserves_data() {
        let idx = VideoIndex::new(vec![0, 7, 22], vec![100, 200, 300]);
        let v1_bytes = idx.encode_v1().unwrap();
        let loaded = VideoIndex::decode(&v1_bytes).unwrap();
        let v2_bytes = loaded.encode_v2("1.0").unwrap();
        let reloaded = VideoIndex::decode(&v2_bytes).unwrap();
        assert_eq!(idx.frames, reloaded.frames);
        assert_eq!(idx.hashes, reloaded.hashes);
    }

    #[test]
    fn truncated_file_fails_without_panicking() {
        let idx = sample();
        let mut bytes = idx.encode_v2("1.0").unwrap();
        bytes.truncate(bytes.len() - 20);
        assert!(VideoIndex::decode(&bytes).is_err());
        assert!(!VideoIndex::verify_bytes(&bytes));
    }

    #[test]
    fn byte_order_mismatch_is_rejected() {
        let idx = sample();
        let bytes = idx.encode_v2("1.0").unwrap();
        let text = String::from_utf8(bytes[..40].to_vec()).unwrap_or_default();
        // flip the byte-order token in the header to force a mismatch
        let flipped_order = if host_byte_order() == "le" { "be" } else { "le" };
        let mangled_header = text.replacen(host_byte_order(), flipped_order, 1);
        let mut mangled = mangled_header.into_bytes();
        mangled.extend_from_slice(&bytes[40..]);
        assert!(matches!(
            VideoIndex::decode(&mangled),
            Err(VdxError::ByteOrderMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_strictly_increasing_frames() {
        let idx = VideoIndex::new(vec![0, 5, 5], vec![1, 2, 3]);
        assert!(idx.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonzero_first_frame() {
        let idx = VideoIndex::new(vec![1, 2], vec![1, 2]);
        assert!(idx.validate().is_err());
    }

    #[test]
    fn v1_rejects_too_many_frames() {
        let n = V1_FRAME_LIMIT + 1;
        let idx = VideoIndex::new((0..n as i32).collect(), vec![0u64; n]);
        assert!(matches!(idx.encode_v1(), Err(VdxError::TooManyFramesForV1(_))));
    }

    #[test]
    fn save_and_load_atomic_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.vdx");
        let idx = sample();
        idx.save_atomic(&path, "1.0").unwrap();
        let loaded = VideoIndex::load(&path).unwrap();
        assert_eq!(idx, loaded);
    }

    #[test]
    fn empty_index_is_valid_and_verifiable() {
        let idx = VideoIndex::default();
        assert!(idx.validate().is_ok());
        let bytes = idx.encode_v2("1.0").unwrap();
        assert!(VideoIndex::verify_bytes(&bytes));
    }
}
