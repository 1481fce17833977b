//! Content-addressed cache of bare git clones (`spec.md` §3 GitStore, §4.4).
//!
//! Every remote is cloned once, bare, keyed by a hash of its url. Fetches
//! pull every ref under a `refs/remotes/cache/*` namespace rather than just
//! `refs/heads/*`/`refs/tags/*`, so a rev given as a raw commit sha, a
//! branch, or a tag all resolve the same way once fetched.

use std::path::{Path, PathBuf};

use depotpm_util::sha256_hex_bytes;
use tracing::debug;

use crate::error::{Error, Result};

const CACHE_REFSPEC: &str = "+refs/*:refs/remotes/cache/*";

pub struct GitStore {
    root: PathBuf,
}

impl GitStore {
    pub fn new(root: PathBuf) -> Self {
        GitStore { root }
    }

    fn bare_path(&self, url: &str) -> PathBuf {
        self.root.join(sha256_hex_bytes(url.as_bytes()))
    }

    fn open_or_init(&self, url: &str) -> Result<git2::Repository> {
        let path = self.bare_path(url);
        if path.is_dir() {
            Ok(git2::Repository::open_bare(&path)?)
        } else {
            std::fs::create_dir_all(path.parent().unwrap_or(&self.root))?;
            Ok(git2::Repository::init_bare(&path)?)
        }
    }

    pub fn fetch(&self, url: &str) -> Result<()> {
        let repo = self.open_or_init(url)?;
        let mut remote = repo.remote_anonymous(url)?;
        debug!(url, "fetching into git cache");
        remote.fetch(&[CACHE_REFSPEC], None, None)?;
        Ok(())
    }

    /// Resolve `rev` (a sha, short sha, branch, or tag) to a commit,
    /// fetching once and retrying if the first lookup fails (`spec.md`
    /// §4.4: `RevNotFound` only after two failed lookups).
    pub fn resolve_rev(&self, url: &str, rev: &str) -> Result<git2::Oid> {
        let repo = self.open_or_init(url)?;
        if let Some(oid) = try_resolve(&repo, rev) {
            return Ok(oid);
        }
        self.fetch(url)?;
        let repo = self.open_or_init(url)?;
        try_resolve(&repo, rev).ok_or_else(|| Error::RevNotFound {
            url: url.to_string(),
            rev: rev.to_string(),
        })
    }

    pub fn tree_sha1_for(&self, url: &str, rev: &str) -> Result<String> {
        let repo = self.open_or_init(url)?;
        let oid = self.resolve_rev(url, rev)?;
        let commit = repo.find_commit(oid)?;
        Ok(commit.tree()?.id().to_string())
    }

    /// Materialize the tree at `tree_sha1` into `dest`, which must not
    /// already exist as a non-empty directory.
    pub fn checkout_tree(&self, url: &str, tree_sha1: &str, dest: &Path) -> Result<()> {
        let repo = self.open_or_init(url)?;
        let oid = git2::Oid::from_str(tree_sha1)?;
        let tree = repo.find_tree(oid)?;
        std::fs::create_dir_all(dest)?;
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.target_dir(dest).force();
        repo.checkout_tree(tree.as_object(), Some(&mut opts))?;
        Ok(())
    }
}

fn try_resolve(repo: &git2::Repository, rev: &str) -> Option<git2::Oid> {
    if let Ok(obj) = repo.revparse_single(rev) {
        return obj.peel_to_commit().ok().map(|c| c.id());
    }
    let qualified = format!("refs/remotes/cache/{rev}");
    repo.revparse_single(&qualified)
        .ok()
        .and_then(|obj| obj.peel_to_commit().ok())
        .map(|c| c.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A plain (non-bare) working repo with one commit, usable as a local
    /// "remote" url: git2 talks to a filesystem path directly, so this
    /// needs no network.
    fn source_repo() -> (tempfile::TempDir, git2::Oid, String) {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("README"), b"hello").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        let commit_id = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        let url = dir.path().to_string_lossy().into_owned();
        (dir, commit_id, url)
    }

    #[test]
    fn fetch_then_resolve_rev_finds_a_commit_by_raw_sha() {
        let (_source, commit_id, url) = source_repo();
        let cache_root = tempfile::tempdir().unwrap();
        let store = GitStore::new(cache_root.path().to_path_buf());

        store.fetch(&url).unwrap();
        let resolved = store.resolve_rev(&url, &commit_id.to_string()).unwrap();
        assert_eq!(resolved, commit_id);
    }

    #[test]
    fn resolve_rev_fetches_lazily_on_first_use() {
        let (_source, commit_id, url) = source_repo();
        let cache_root = tempfile::tempdir().unwrap();
        let store = GitStore::new(cache_root.path().to_path_buf());

        // No explicit `fetch` call first: resolve_rev must fetch on a miss.
        let resolved = store.resolve_rev(&url, &commit_id.to_string()).unwrap();
        assert_eq!(resolved, commit_id);
    }

    #[test]
    fn unknown_rev_is_reported_as_not_found_after_a_retry() {
        let (_source, _commit_id, url) = source_repo();
        let cache_root = tempfile::tempdir().unwrap();
        let store = GitStore::new(cache_root.path().to_path_buf());

        let err = store.resolve_rev(&url, "0000000000000000000000000000000000dead").unwrap_err();
        assert!(matches!(err, Error::RevNotFound { .. }));
    }

    #[test]
    fn tree_sha1_for_then_checkout_tree_materializes_the_commit_contents() {
        let (_source, commit_id, url) = source_repo();
        let cache_root = tempfile::tempdir().unwrap();
        let store = GitStore::new(cache_root.path().to_path_buf());

        let tree_sha1 = store.tree_sha1_for(&url, &commit_id.to_string()).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let target = dest.path().join("checkout");
        store.checkout_tree(&url, &tree_sha1, &target).unwrap();

        let contents = std::fs::read(target.join("README")).unwrap();
        assert_eq!(contents, b"hello");
    }
}
