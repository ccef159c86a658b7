//! ZIP-family archive traversal (§4.F). Archive members get a virtual path
//! `<archive-path>:<member-path>`; the rightmost such marker splits a given
//! virtual path back into its two halves.

use std::path::{Path, PathBuf};

/// Office/ebook formats are all zip containers underneath (cbird treats
/// them uniformly — `.cbz`/`.epub`/office formats included, §10.6).
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "cbz", "epub", "odt", "ods", "odp", "docx", "pptx", "xlsx", "xps",
];

#[must_use]
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.iter().any(|ext| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Split `archive.zip:inner/member.png` into
/// `(archive.zip, inner/member.png)` by locating the rightmost archive
/// extension marker in the path.
#[must_use]
pub fn split_virtual_path(virtual_path: &str) -> Option<(PathBuf, String)> {
    for ext in ARCHIVE_EXTENSIONS {
        let marker = format!(".{ext}:");
        if let Some(pos) = virtual_path.rfind(&marker) {
            let split_at = pos + marker.len() - 1;
            let archive = &virtual_path[..split_at];
            let member = &virtual_path[split_at + 1..];
            return Some((PathBuf::from(archive), member.to_string()));
        }
    }
    None
}

#[must_use]
pub fn make_virtual_path(archive: &Path, member: &str) -> String {
    format!("{}:{}", archive.display(), member)
}

/// Enumerate member paths inside a zip-family archive. A failure on one
/// member is recorded and skipped rather than aborting the whole archive
/// (§4.F, §7).
pub fn list_members(archive_path: &Path) -> crate::error::Result<Vec<String>> {
    let file = std::fs::File::open(archive_path).map_err(|source| crate::error::ScanError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| crate::error::ScanError::ArchiveMember {
        archive: archive_path.to_path_buf(),
        member: String::new(),
        message: e.to_string(),
    })?;
    let mut members = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        match zip.by_index(i) {
            Ok(entry) => {
                if !entry.is_dir() {
                    members.push(entry.name().to_string());
                }
            }
            Err(e) => {
                tracing::warn!(archive = %archive_path.display(), index = i, error = %e, "skipping unreadable archive member");
            }
        }
    }
    Ok(members)
}
