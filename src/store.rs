//! Content-addressed install layout for resolved packages (`spec.md` §3
//! PackageStore, §4.10, §9 legacy slug-width note).

use std::path::{Path, PathBuf};

use depotpm_util::paths::{install_atomic, scratch_dir_near};
use uuid::Uuid;

use crate::error::Result;

/// Hex-digit width of the uuid-bucket directory this store currently
/// writes. Older installs may still sit under [`LEGACY_SLUG_WIDTH`];
/// [`PackageStore::locate`] probes both so a store populated before a
/// width change keeps resolving.
const CURRENT_SLUG_WIDTH: usize = 8;
const LEGACY_SLUG_WIDTH: usize = 4;

pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    pub fn new(root: PathBuf) -> Self {
        PackageStore { root }
    }

    fn slug_path(&self, name: &str, uuid: Uuid, tree_sha1: &str, width: usize) -> PathBuf {
        let simple = uuid.simple().to_string();
        let bucket = &simple[..width.min(simple.len())];
        self.root.join(name).join(bucket).join(tree_sha1)
    }

    /// Find an existing install, trying the current slug width first and
    /// falling back to the legacy width.
    pub fn locate(&self, name: &str, uuid: Uuid, tree_sha1: &str) -> Option<PathBuf> {
        let current = self.slug_path(name, uuid, tree_sha1, CURRENT_SLUG_WIDTH);
        if current.is_dir() {
            return Some(current);
        }
        let legacy = self.slug_path(name, uuid, tree_sha1, LEGACY_SLUG_WIDTH);
        if legacy.is_dir() {
            return Some(legacy);
        }
        None
    }

    /// Idempotently install the contents of `source_dir` under this
    /// store's current slug layout. If an install already exists (at
    /// either slug width) this is a no-op and returns its path.
    pub fn install(&self, name: &str, uuid: Uuid, tree_sha1: &str, source_dir: &Path) -> Result<PathBuf> {
        if let Some(existing) = self.locate(name, uuid, tree_sha1) {
            return Ok(existing);
        }
        let dest = self.slug_path(name, uuid, tree_sha1, CURRENT_SLUG_WIDTH);
        let scratch = scratch_dir_near(&dest)?;
        let staged = scratch.path().join("tree");
        copy_dir_recursive(source_dir, &staged)?;
        install_atomic(&staged, &dest)?;
        Ok(dest)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in walkdir::WalkDir::new(src).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        let rel = entry.path().strip_prefix(src).unwrap();
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid() -> Uuid {
        Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
    }

    #[test]
    fn install_is_idempotent_and_locate_finds_it_afterward() {
        let store_root = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("src.rs"), b"fn main() {}").unwrap();
        std::fs::create_dir_all(source.path().join("nested")).unwrap();
        std::fs::write(source.path().join("nested").join("lib.rs"), b"// nested").unwrap();

        let store = PackageStore::new(store_root.path().to_path_buf());
        assert!(store.locate("widget", uuid(), "abc123").is_none());

        let first = store.install("widget", uuid(), "abc123", source.path()).unwrap();
        assert!(first.join("src.rs").exists());
        assert!(first.join("nested").join("lib.rs").exists());

        let located = store.locate("widget", uuid(), "abc123").unwrap();
        assert_eq!(located, first);

        // A second install of the same (name, uuid, tree) is a no-op that
        // returns the existing path rather than re-copying.
        let second = store.install("widget", uuid(), "abc123", source.path()).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn locate_falls_back_to_the_legacy_slug_width() {
        let store_root = tempfile::tempdir().unwrap();
        let store = PackageStore::new(store_root.path().to_path_buf());

        let legacy_path = store.slug_path("widget", uuid(), "abc123", LEGACY_SLUG_WIDTH);
        std::fs::create_dir_all(&legacy_path).unwrap();

        let located = store.locate("widget", uuid(), "abc123").unwrap();
        assert_eq!(located, legacy_path);
    }
}
