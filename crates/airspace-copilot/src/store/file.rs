//! Snapshot files on disk.
//!
//! Each region lives in `<data_dir>/<region_id>.json`. Writers go through a
//! temporary file and a rename so readers only ever see a complete file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{Error, Result};
use crate::flight::{validate_region_id, RegionSnapshot};

/// Extension of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Distinguishes temporary files of concurrent writers in one process.
static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Path of the snapshot file for a region.
#[must_use]
pub fn snapshot_path(dir: &Path, region_id: &str) -> PathBuf {
    dir.join(format!("{region_id}.{SNAPSHOT_EXTENSION}"))
}

/// Region id encoded in a snapshot file name, if the path looks like one.
#[must_use]
pub fn region_id_from_path(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_region_id(stem).ok()?;
    Some(stem.to_string())
}

/// List snapshot files in a directory, sorted by path.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_snapshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && region_id_from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write a snapshot atomically into `dir`.
///
/// Creates `dir` if needed. Returns the final path.
///
/// # Errors
///
/// Returns an error if the snapshot is invalid or the file cannot be written.
pub fn write_snapshot(dir: &Path, snapshot: &RegionSnapshot) -> Result<PathBuf> {
    snapshot.validate()?;

    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let path = snapshot_path(dir, &snapshot.region_id);
    let tmp = temp_path(dir, &snapshot.region_id);

    let bytes = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }

    debug!(path = %path.display(), flights = snapshot.len(), "Wrote snapshot file");
    Ok(path)
}

/// A temporary file name no other writer uses.
fn temp_path(dir: &Path, region_id: &str) -> PathBuf {
    dir.join(format!(
        ".{region_id}.{}.{}.tmp",
        std::process::id(),
        TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ))
}
