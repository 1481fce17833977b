//! Temp-then-rename helpers shared by GitStore, ArtifactCache, and
//! PackageStore so that all three content-addressed stores get the same
//! concurrency-safe install pattern (`spec.md` §5).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// Create a temp directory next to `final_dir`'s parent so the eventual
/// rename is same-filesystem (and therefore atomic).
pub fn scratch_dir_near(final_path: &Path) -> io::Result<TempDir> {
    let parent = final_path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;
    tempfile::Builder::new()
        .prefix(".depotpm-tmp-")
        .tempdir_in(parent)
}

/// Move `from` into `to`, tolerating a race where another writer already
/// placed content at `to`: the loser silently discards `from` rather than
/// erroring, matching the "either wins" rule of `spec.md` §5.
///
/// Returns `Ok(true)` if this call won the race (performed the rename),
/// `Ok(false)` if a concurrent writer had already won.
pub fn install_atomic(from: &Path, to: &Path) -> io::Result<bool> {
    if to.exists() {
        debug!(to = %to.display(), "install target already present, skipping");
        return Ok(false);
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(_) if to.exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// `true` if `a` and `b` are the same file on disk (same device and
/// inode), used by callers deciding whether a losing `install_atomic` race
/// actually landed the content they expected.
pub fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    same_file::is_same_file(a, b)
}

/// Write `contents` to `path` atomically: write to a sibling temp file, then
/// rename over the destination. Used for Project/Manifest saves so a crash
/// mid-write never leaves a truncated file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".depotpm-tmp-")
        .tempfile_in(parent)?;
    use std::io::Write;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| e.error)?;
    Ok(())
}

/// A stable textual encoding of a content-address key, used by PackageStore
/// for its canonical on-disk slug (`spec.md` §4.10, §9 legacy-width note).
pub fn slug(parts: &[&str]) -> PathBuf {
    PathBuf::from(parts.join("-"))
}
