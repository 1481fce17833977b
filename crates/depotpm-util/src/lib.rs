//! Miscellaneous filesystem and hashing support code used by depotpm.
//!
//! Kept separate from the main crate so it stays free of any knowledge of
//! projects, manifests, or registries — only paths and bytes.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use sha2::Sha256;

pub mod paths;

/// Hash a byte stream with SHA-1, returning lowercase hex.
///
/// Used for git tree identity (`spec.md` §3's 20-byte SHA-1 content hash).
pub fn sha1_hex_reader<R: Read>(mut r: R) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash a byte stream with SHA-256, returning lowercase hex.
///
/// Used for artifact content addressing (`spec.md` §4.9).
pub fn sha256_hex_reader<R: Read>(mut r: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_hex_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn sha256_hex_file(path: &Path) -> io::Result<String> {
    sha256_hex_reader(fs::File::open(path)?)
}

/// Git-compatible tree hash of a directory: hashes the sorted relative paths
/// and contents of every regular file under `root`. This is not bit-for-bit
/// identical to `git hash-object -t tree` (which hashes a recursive tree of
/// per-entry object hashes); it is a simpler, still-deterministic content
/// digest used where a real git repository is not involved (artifact
/// extraction rather than checkout). GitStore never calls this: it reads the
/// tree hash straight out of the git object database.
pub fn hash_tree_sha1(root: &Path) -> io::Result<String> {
    let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    entries.sort();

    let mut hasher = Sha1::new();
    for rel in entries {
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        let mut f = fs::File::open(root.join(&rel))?;
        let mut buf = [0u8; 8192];
        loop {
            let n = f.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}
