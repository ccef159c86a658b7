//! Opaque key-value metadata store (§4.E). Single-writer/multi-reader
//! behind one `RwLock`; the engine is the sole caller.

use crate::error::{Result, StoreError};
use media_dedup_common::{Digest, Media, MediaId};
use media_dedup_index::{Index, Match, SearchParams};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Default)]
struct StoreInner {
    by_id: HashMap<MediaId, Media>,
    path_to_id: HashMap<PathBuf, MediaId>,
    digest_to_id: HashMap<[u8; 16], MediaId>,
    next_id: MediaId,
}

pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Store {
            inner: RwLock::new(StoreInner { next_id: 1, ..Default::default() }),
        }
    }

    /// Assign ids (if zero) and insert. Sorted by path first so ids are
    /// assigned in a stable order within the batch (§5).
    pub fn add(&self, mut group: Vec<Media>) -> Result<Vec<MediaId>> {
        group.sort_by(|a, b| a.path.cmp(&b.path));
        let mut inner = self.inner.write().unwrap();
        if group.iter().any(|m| inner.path_to_id.contains_key(&m.path) && m.id == 0) {
            let dup = group.iter().find(|m| inner.path_to_id.contains_key(&m.path)).unwrap();
            return Err(StoreError::DuplicatePath(dup.path.clone()));
        }
        let mut ids = Vec::with_capacity(group.len());
        for mut m in group {
            if m.id == 0 {
                m.id = inner.next_id;
                inner.next_id += 1;
            }
            inner.path_to_id.insert(m.path.clone(), m.id);
            if let Some(d) = m.digest {
                inner.digest_to_id.insert(d.0, m.id);
            }
            ids.push(m.id);
            inner.by_id.insert(m.id, m);
        }
        Ok(ids)
    }

    pub fn remove(&self, ids: &[MediaId]) {
        let mut inner = self.inner.write().unwrap();
        for &id in ids {
            if let Some(m) = inner.by_id.remove(&id) {
                inner.path_to_id.remove(&m.path);
                if let Some(d) = m.digest {
                    inner.digest_to_id.remove(&d.0);
                }
            }
        }
    }

    #[must_use]
    pub fn media_with_id(&self, id: MediaId) -> Option<Media> {
        self.inner.read().unwrap().by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn media_with_md5(&self, digest: Digest) -> Option<Media> {
        let inner = self.inner.read().unwrap();
        inner.digest_to_id.get(&digest.0).and_then(|id| inner.by_id.get(id)).cloned()
    }

    #[must_use]
    pub fn media_with_path_like(&self, needle: &str) -> Vec<Media> {
        let inner = self.inner.read().unwrap();
        inner
            .by_id
            .values()
            .filter(|m| m.path.to_string_lossy().contains(needle))
            .cloned()
            .collect()
    }

    /// Generalizes the original's `media_with_sql(expr, binds)`: with no
    /// relational backend in this crate, arbitrary predicates take the
    /// place of a SQL expression string.
    #[must_use]
    pub fn media_with_predicate(&self, pred: impl Fn(&Media) -> bool) -> Vec<Media> {
        self.inner.read().unwrap().by_id.values().filter(|m| pred(m)).cloned().collect()
    }

    #[must_use]
    pub fn indexed_files(&self) -> HashSet<PathBuf> {
        self.inner.read().unwrap().path_to_id.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delegates to the given index backend (§4.E: "dispatched through
    /// this interface for the engine's convenience"). The engine owns the
    /// index and passes it in rather than the store owning it.
    #[must_use]
    pub fn similar_to(&self, needle: &Media, params: &SearchParams, index: &dyn Index) -> Vec<Match> {
        index.find(needle, params)
    }

    /// Atomic path rename: updates the filesystem and the in-memory index
    /// together. Archive members (virtual paths) are rejected.
    pub fn rename(&self, id: MediaId, new_path: PathBuf) -> Result<()> {
        if is_archive_member(&new_path) {
            return Err(StoreError::ArchiveMemberImmutable(new_path));
        }
        let mut inner = self.inner.write().unwrap();
        let Some(media) = inner.by_id.get(&id) else {
            return Err(StoreError::NotFound(id));
        };
        let old_path = media.path.clone();
        if old_path != new_path {
            std::fs::rename(&old_path, &new_path)?;
        }
        inner.path_to_id.remove(&old_path);
        inner.path_to_id.insert(new_path.clone(), id);
        inner.by_id.get_mut(&id).unwrap().path = new_path;
        Ok(())
    }

    /// Move every media whose path is under `from_dir` to the equivalent
    /// path under `to_dir`.
    pub fn move_dir(&self, from_dir: &Path, to_dir: &Path) -> Result<usize> {
        let ids: Vec<(MediaId, PathBuf)> = {
            let inner = self.inner.read().unwrap();
            inner
                .by_id
                .iter()
                .filter(|(_, m)| m.path.starts_with(from_dir))
                .map(|(&id, m)| (id, m.path.clone()))
                .collect()
        };
        let mut moved = 0;
        for (id, old_path) in ids {
            let rel = old_path.strip_prefix(from_dir).unwrap();
            self.rename(id, to_dir.join(rel))?;
            moved += 1;
        }
        Ok(moved)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn is_archive_member(path: &Path) -> bool {
    path.to_string_lossy().contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_dedup_common::MediaType;

    fn media(path: &str) -> Media {
        Media::new(PathBuf::from(path), MediaType::Image)
    }

    #[test]
    fn add_assigns_monotonic_ids() {
        let store = Store::new();
        let ids = store.add(vec![media("/a"), media("/b")]).unwrap();
        assert_ne!(ids[0], 0);
        assert_ne!(ids[1], 0);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn media_with_id_roundtrips() {
        let store = Store::new();
        let ids = store.add(vec![media("/a")]).unwrap();
        let m = store.media_with_id(ids[0]).unwrap();
        assert_eq!(m.path, PathBuf::from("/a"));
    }

    #[test]
    fn remove_drops_from_all_indices() {
        let store = Store::new();
        let ids = store.add(vec![media("/a")]).unwrap();
        store.remove(&ids);
        assert!(store.media_with_id(ids[0]).is_none());
        assert!(!store.indexed_files().contains(&PathBuf::from("/a")));
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let store = Store::new();
        store.add(vec![media("/a")]).unwrap();
        let result = store.add(vec![media("/a")]);
        assert!(result.is_err());
    }

    #[test]
    fn rename_updates_path_index() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.png");
        let new = dir.path().join("new.png");
        std::fs::write(&old, b"x").unwrap();
        let store = Store::new();
        let ids = store.add(vec![media(old.to_str().unwrap())]).unwrap();
        store.rename(ids[0], new.clone()).unwrap();
        assert!(store.indexed_files().contains(&new));
        assert!(new.exists());
    }

    #[test]
    fn rename_rejects_archive_member_target() {
        let store = Store::new();
        let ids = store.add(vec![media("/a")]).unwrap();
        let result = store.rename(ids[0], PathBuf::from("/archive.zip:member.png"));
        assert!(result.is_err());
    }
}
