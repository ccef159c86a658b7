//! Multi-writer detection (§4.E, §5): a lock file in the store directory
//! guards against two writer processes mutating the same store at once.

use crate::error::{Result, StoreError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    /// Acquire the lock, failing if another writer already holds it.
    pub fn acquire(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(".writer.lock");
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|_| StoreError::ConcurrentWriter(path.clone()))?;
        writeln!(file, "{}", std::process::id())?;
        Ok(WriterLock { path })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let first = WriterLock::acquire(dir.path()).unwrap();
        let second = WriterLock::acquire(dir.path());
        assert!(second.is_err());
        drop(first);
        assert!(WriterLock::acquire(dir.path()).is_ok());
    }
}
