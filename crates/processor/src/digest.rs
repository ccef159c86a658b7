//! Content digest (§3, §4.G): MD5 over the payload, but for JPEGs the hash
//! starts at the first `SOS` marker so EXIF/IPTC edits in APP segments
//! don't invalidate it.

use md5::{Digest as _, Md5};
use media_dedup_common::Digest;

const SOS_MARKER: [u8; 2] = [0xFF, 0xDA];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[must_use]
pub fn compute_digest(bytes: &[u8]) -> Digest {
    let payload = if bytes.starts_with(&JPEG_MAGIC) {
        find_sos(bytes).map(|pos| &bytes[pos..]).unwrap_or(bytes)
    } else {
        bytes
    };
    let mut hasher = Md5::new();
    hasher.update(payload);
    let out = hasher.finalize();
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&out);
    Digest(buf)
}

fn find_sos(bytes: &[u8]) -> Option<usize> {
    let mut i = 2; // skip SOI
    while i + 1 < bytes.len() {
        if bytes[i] == SOS_MARKER[0] && bytes[i + 1] == SOS_MARKER[1] {
            return Some(i);
        }
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = bytes[i + 1];
        // standalone markers carry no length field
        if (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            i += 2;
            continue;
        }
        if i + 3 >= bytes.len() {
            break;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        i += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_jpeg_hashes_whole_payload() {
        let a = compute_digest(b"hello world");
        let b = compute_digest(b"hello world");
        assert_eq!(a.0, b.0);
        assert_ne!(compute_digest(b"hello world").0, compute_digest(b"hello worlD").0);
    }

    #[test]
    fn jpeg_digest_ignores_app_segment_changes() {
        // SOI, APP0 (len 4, payload "AB"), SOS, scan data
        let mut a = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, b'A', b'B'];
        a.extend_from_slice(&[0xFF, 0xDA, 1, 2, 3]);
        let mut b = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, b'X', b'Y'];
        b.extend_from_slice(&[0xFF, 0xDA, 1, 2, 3]);
        assert_eq!(compute_digest(&a).0, compute_digest(&b).0);
    }

    #[test]
    fn jpeg_digest_changes_when_scan_data_changes() {
        let mut a = vec![0xFF, 0xD8, 0xFF, 0xDA];
        a.extend_from_slice(&[1, 2, 3]);
        let mut b = vec![0xFF, 0xD8, 0xFF, 0xDA];
        b.extend_from_slice(&[1, 2, 4]);
        assert_ne!(compute_digest(&a).0, compute_digest(&b).0);
    }
}
