//! Depot search-path resolution: `DEPOT_PATH`, `LOAD_PATH`, `OFFLINE`, and
//! `CONCURRENCY` (`spec.md` §3 Depot, §5).

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::registry::Registry;

const DEPOT_PATH_VAR: &str = "DEPOT_PATH";
const LOAD_PATH_VAR: &str = "LOAD_PATH";
const OFFLINE_VAR: &str = "OFFLINE";
const CONCURRENCY_VAR: &str = "CONCURRENCY";

const DEFAULT_CONCURRENCY: usize = 4;

/// The set of roots depotpm reads from and writes to. `depot_path` entries
/// are writable (the first one depotpm can actually write to receives new
/// installs); `load_path` entries are read-only and consulted only to find
/// registries and stdlib tables, never written to.
#[derive(Debug, Clone)]
pub struct Depot {
    pub depot_path: Vec<PathBuf>,
    pub load_path: Vec<PathBuf>,
    pub offline: bool,
    pub concurrency: usize,
}

impl Depot {
    pub fn from_env(default_root: &Path) -> Depot {
        let depot_path = split_path_var(DEPOT_PATH_VAR).unwrap_or_else(|| vec![default_root.to_path_buf()]);
        let load_path = split_path_var(LOAD_PATH_VAR).unwrap_or_default();
        let offline = env::var(OFFLINE_VAR).is_ok_and(|v| v != "0" && !v.is_empty());
        let concurrency = env::var(CONCURRENCY_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CONCURRENCY);

        Depot {
            depot_path,
            load_path,
            offline,
            concurrency,
        }
    }

    /// The first `depot_path` entry depotpm can write new installs into,
    /// creating it if it doesn't exist yet.
    pub fn first_writable(&self) -> Result<&Path> {
        for root in &self.depot_path {
            std::fs::create_dir_all(root)?;
            let probe = root.join(".depotpm-write-probe");
            if std::fs::write(&probe, b"").is_ok() {
                let _ = std::fs::remove_file(&probe);
                return Ok(root);
            }
        }
        Err(crate::error::Error::Other(String::from(
            "no writable entry in DEPOT_PATH",
        )))
    }

    fn search_roots(&self) -> impl Iterator<Item = &PathBuf> {
        self.depot_path.iter().chain(self.load_path.iter())
    }

    /// Every registry reachable from `depot_path` or `load_path`, first
    /// occurrence of a given uuid winning (`depot_path` is searched first).
    pub fn reachable_registries(&self) -> Result<Vec<Registry>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for root in self.search_roots() {
            let registries_dir = root.join("registries");
            let Ok(entries) = std::fs::read_dir(&registries_dir) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let Ok(registry) = Registry::load(&entry.path()) else {
                    continue;
                };
                if seen.insert(registry.uuid) {
                    out.push(registry);
                }
            }
        }
        Ok(out)
    }

    pub fn stdlib_root(&self) -> Option<PathBuf> {
        self.search_roots().map(|r| r.join("stdlib")).find(|p| p.is_dir())
    }

    pub fn git_cache_root(&self) -> Result<PathBuf> {
        let root = self.first_writable()?.join("git-cache");
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }

    pub fn artifact_cache_root(&self) -> Result<PathBuf> {
        let root = self.first_writable()?.join("artifacts");
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }

    pub fn package_store_root(&self) -> Result<PathBuf> {
        let root = self.first_writable()?.join("packages");
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }
}

fn split_path_var(name: &str) -> Option<Vec<PathBuf>> {
    let raw = env::var(name).ok()?;
    Some(
        env::split_paths(&raw)
            .filter(|p| !p.as_os_str().is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_empty_registry(root: &Path, name: &str, registry_uuid: &str) {
        let dir = root.join("registries").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Registry.toml"),
            format!("name = \"{name}\"\nuuid = \"{registry_uuid}\"\n\n[packages]\n"),
        )
        .unwrap();
    }

    #[test]
    fn first_writable_creates_and_returns_the_first_depot_path_entry() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let depot = Depot {
            depot_path: vec![a.path().join("missing-subdir"), b.path().to_path_buf()],
            load_path: vec![],
            offline: false,
            concurrency: 1,
        };
        let writable = depot.first_writable().unwrap();
        assert_eq!(writable, a.path().join("missing-subdir"));
        assert!(writable.is_dir());
    }

    #[test]
    fn reachable_registries_prefers_depot_path_and_dedupes_by_uuid() {
        let depot_root = tempfile::tempdir().unwrap();
        let load_root = tempfile::tempdir().unwrap();

        write_empty_registry(depot_root.path(), "General", "99999999-9999-9999-9999-999999999999");
        // Same uuid under a differently-named directory on the load path:
        // the depot_path copy must win and the load_path copy must be
        // skipped rather than producing a duplicate entry.
        write_empty_registry(load_root.path(), "General", "99999999-9999-9999-9999-999999999999");
        write_empty_registry(load_root.path(), "Other", "88888888-8888-8888-8888-888888888888");

        let depot = Depot {
            depot_path: vec![depot_root.path().to_path_buf()],
            load_path: vec![load_root.path().to_path_buf()],
            offline: false,
            concurrency: 1,
        };

        let registries = depot.reachable_registries().unwrap();
        assert_eq!(registries.len(), 2);
        let names: HashSet<&str> = registries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["General", "Other"]));
    }
}
