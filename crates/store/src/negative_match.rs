//! Undirected negative-match blacklist (§3, §4.E): pairs of digests known
//! to be visually similar but semantically different, persisted as
//! append-only CSV.

use crate::error::Result;
use media_dedup_common::Digest;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

fn canonical_pair(a: Digest, b: Digest) -> (String, String) {
    let (a, b) = (a.to_hex(), b.to_hex());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
pub struct NegativeMatchMap {
    pairs: RwLock<HashSet<(String, String)>>,
    path: RwLock<Option<PathBuf>>,
}

impl NegativeMatchMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_negative_match(&self, a: Digest, b: Digest) -> Result<()> {
        let key = canonical_pair(a, b);
        self.pairs.write().unwrap().insert(key.clone());
        if let Some(path) = self.path.read().unwrap().as_ref() {
            let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{},{}", key.0, key.1)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_negative_match(&self, a: Digest, b: Digest) -> bool {
        let key = canonical_pair(a, b);
        self.pairs.read().unwrap().contains(&key)
    }

    /// Load (and remember) a CSV file of `md5_a,md5_b` records, merging
    /// with whatever is already in memory.
    pub fn load(&self, path: &Path) -> Result<()> {
        let mut pairs = self.pairs.write().unwrap();
        if path.exists() {
            let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
            for record in reader.records() {
                let record = record?;
                if record.len() == 2 {
                    let (a, b) = (record[0].to_string(), record[1].to_string());
                    pairs.insert(if a <= b { (a, b) } else { (b, a) });
                }
            }
        }
        *self.path.write().unwrap() = Some(path.to_path_buf());
        Ok(())
    }

    pub fn unload(&self) {
        self.pairs.write().unwrap().clear();
        *self.path.write().unwrap() = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(byte: u8) -> Digest {
        Digest([byte; 16])
    }

    #[test]
    fn add_is_symmetric() {
        let map = NegativeMatchMap::new();
        map.add_negative_match(d(1), d(2)).unwrap();
        assert!(map.is_negative_match(d(1), d(2)));
        assert!(map.is_negative_match(d(2), d(1)));
    }

    #[test]
    fn load_persists_across_unload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neg.csv");
        let map = NegativeMatchMap::new();
        map.load(&path).unwrap();
        map.add_negative_match(d(3), d(4)).unwrap();
        map.unload();

        let reloaded = NegativeMatchMap::new();
        reloaded.load(&path).unwrap();
        assert!(reloaded.is_negative_match(d(3), d(4)));
    }
}
