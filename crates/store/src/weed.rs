//! Directed weed map (§3, §4.E): `digest_deleted -> digest_canonical`.
//! Non-circular by construction — `add_weed` rejects self-reference and
//! entries that would chain back onto an existing weed.

use crate::error::Result;
use media_dedup_common::Digest;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Default)]
pub struct WeedMap {
    entries: RwLock<HashMap<String, String>>,
    path: RwLock<Option<PathBuf>>,
}

impl WeedMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `deleted -> canonical`. Rejected (returns `false`) if
    /// `deleted == canonical`, or if `canonical` is itself already a weed
    /// key (would create a chain rather than pointing at a true original).
    pub fn add_weed(&self, deleted: Digest, canonical: Digest) -> Result<bool> {
        if deleted.to_hex() == canonical.to_hex() {
            return Ok(false);
        }
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&canonical.to_hex()) {
            return Ok(false);
        }
        let (d, c) = (deleted.to_hex(), canonical.to_hex());
        entries.insert(d.clone(), c.clone());
        if let Some(path) = self.path.read().unwrap().as_ref() {
            let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{d},{c}")?;
        }
        Ok(true)
    }

    #[must_use]
    pub fn is_weed_key(&self, digest: Digest) -> bool {
        self.entries.read().unwrap().contains_key(&digest.to_hex())
    }

    #[must_use]
    pub fn canonical_for(&self, digest: Digest) -> Option<String> {
        self.entries.read().unwrap().get(&digest.to_hex()).cloned()
    }

    pub fn remove_weed(&self, digest: Digest) {
        self.entries.write().unwrap().remove(&digest.to_hex());
    }

    #[must_use]
    pub fn weeds(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect()
    }

    pub fn load(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        if path.exists() {
            let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
            for record in reader.records() {
                let record = record?;
                if record.len() == 2 {
                    entries.insert(record[0].to_string(), record[1].to_string());
                }
            }
        }
        *self.path.write().unwrap() = Some(path.to_path_buf());
        Ok(())
    }

    pub fn unload(&self) {
        self.entries.write().unwrap().clear();
        *self.path.write().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(byte: u8) -> Digest {
        Digest([byte; 16])
    }

    #[test]
    fn rejects_self_reference() {
        let map = WeedMap::new();
        assert!(!map.add_weed(d(1), d(1)).unwrap());
    }

    #[test]
    fn rejects_chaining_onto_existing_weed() {
        let map = WeedMap::new();
        assert!(map.add_weed(d(1), d(2)).unwrap());
        // d(2) is already a canonical target, not itself a weed key, so this is fine...
        assert!(map.add_weed(d(3), d(2)).unwrap());
        // ...but d(1) is a weed key, so pointing anything at it as canonical is circular.
        assert!(!map.add_weed(d(4), d(1)).unwrap());
    }

    #[test]
    fn is_weed_key_reflects_membership() {
        let map = WeedMap::new();
        map.add_weed(d(1), d(2)).unwrap();
        assert!(map.is_weed_key(d(1)));
        assert!(!map.is_weed_key(d(2)));
    }
}
