//! Top-level orchestration: load Project/Manifest, resolve, and
//! instantiate a resolved environment into the store (`spec.md` §3 Context,
//! §5, §6).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::depot::Depot;
use crate::error::Result;
use crate::manifest::{EntryLocation, Manifest, ManifestEntry};
use crate::project::Project;
use crate::registry::Registry;
use crate::resolver::{PreservationLevel, ResolvedSource, Resolver};
use crate::source::artifact::ArtifactCache;
use crate::source::git::GitStore;
use crate::stdlib::StdlibTable;
use crate::store::PackageStore;
use crate::version::Version;

pub struct Context {
    pub depot: Depot,
    pub project_path: PathBuf,
    pub manifest_path: PathBuf,
    pub project: Project,
    pub manifest: Manifest,
    pub registries: Vec<Registry>,
    pub stdlib: StdlibTable,
    pub host_version: Version,
    /// When set, `resolve`/`instantiate` compute what they would do
    /// without writing anything to disk (`spec.md` §6 `--preview`).
    pub preview: bool,
}

impl Context {
    pub fn load(project_path: PathBuf, manifest_path: PathBuf, host_version: Version, depot: Depot, preview: bool) -> Result<Context> {
        let project = Project::load(&project_path)?;
        let manifest = if manifest_path.exists() {
            Manifest::load(&manifest_path)?
        } else {
            Manifest::empty()
        };
        let registries = depot.reachable_registries()?;
        let stdlib = match depot.stdlib_root() {
            Some(root) => StdlibTable::load(&root)?,
            None => StdlibTable::default(),
        };

        Ok(Context {
            depot,
            project_path,
            manifest_path,
            project,
            manifest,
            registries,
            stdlib,
            host_version,
            preview,
        })
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.registries, &self.stdlib, self.host_version)
    }

    /// Resolve dependencies for `active_targets` at `level`, updating
    /// `self.manifest` in place and pruning anything no longer reachable.
    pub fn resolve(&mut self, active_targets: &[String], level: PreservationLevel) -> Result<()> {
        let resolved = self.resolver().resolve(&self.project, &self.manifest, active_targets, level)?;

        let name_for = name_lookup(&self.project, &self.registries, &resolved);
        let mut packages: BTreeMap<String, Vec<ManifestEntry>> = BTreeMap::new();
        for (uuid, entry) in &resolved {
            let name = name_for.get(uuid).cloned().unwrap_or_else(|| uuid.to_string());
            let location = match &entry.source {
                ResolvedSource::Registry { tree_sha1, .. } => EntryLocation::Registry {
                    git_tree_sha1: tree_sha1.clone(),
                },
                ResolvedSource::Path(p) => EntryLocation::Path(p.clone()),
                ResolvedSource::Repo {
                    repo_url,
                    repo_rev,
                    repo_subdir,
                } => EntryLocation::Repo {
                    repo_url: repo_url.clone(),
                    repo_rev: repo_rev.clone(),
                    repo_subdir: repo_subdir.clone(),
                },
                ResolvedSource::Stdlib => EntryLocation::Stdlib,
            };
            packages.entry(name).or_default().push(ManifestEntry {
                uuid: *uuid,
                version: entry.version,
                location,
                pinned: self.manifest.find(*uuid).is_some_and(|(_, e)| e.pinned),
                deps: entry.deps.clone(),
            });
        }

        let mut manifest = Manifest {
            manifest_format: self.manifest.manifest_format.clone(),
            host_version: Some(self.host_version),
            packages,
        };
        let roots: Vec<Uuid> = self
            .project
            .active_dep_names(active_targets)
            .iter()
            .filter_map(|n| self.project.uuid_for(n))
            .collect();
        manifest.prune_unreachable(&roots);

        self.manifest = manifest;
        if !self.preview {
            self.manifest.save(&self.manifest_path)?;
        }
        Ok(())
    }

    /// Install every registry/repo-sourced manifest entry into the
    /// package store, fetching from the git cache as needed.
    pub fn instantiate(&self) -> Result<()> {
        if self.preview {
            return Ok(());
        }
        let store = PackageStore::new(self.depot.package_store_root()?);
        let git = GitStore::new(self.depot.git_cache_root()?);
        let _artifacts = ArtifactCache::new(self.depot.artifact_cache_root()?, self.depot.concurrency);

        for (name, entries) in &self.manifest.packages {
            for entry in entries {
                self.instantiate_one(name, entry, &store, &git)?;
            }
        }
        Ok(())
    }

    fn instantiate_one(&self, name: &str, entry: &ManifestEntry, store: &PackageStore, git: &GitStore) -> Result<()> {
        match &entry.location {
            EntryLocation::Path(_) | EntryLocation::Stdlib => Ok(()),
            EntryLocation::Registry { git_tree_sha1 } => {
                let registry = self
                    .registries
                    .iter()
                    .find(|r| r.entry(entry.uuid).is_some())
                    .ok_or_else(|| crate::error::Error::Other(format!("no reachable registry knows about `{name}`")))?;
                let repo_url = registry
                    .repo_url
                    .clone()
                    .unwrap_or_else(|| registry.name.clone());
                if store.locate(name, entry.uuid, git_tree_sha1).is_some() {
                    return Ok(());
                }
                info!(name, tree = git_tree_sha1, "installing from registry");
                let scratch = tempfile::tempdir()?;
                git.checkout_tree(&repo_url, git_tree_sha1, scratch.path())?;
                store.install(name, entry.uuid, git_tree_sha1, scratch.path())?;
                Ok(())
            }
            EntryLocation::Repo {
                repo_url,
                repo_rev,
                repo_subdir,
            } => {
                let tree_sha1 = git.tree_sha1_for(repo_url, repo_rev)?;
                if store.locate(name, entry.uuid, &tree_sha1).is_some() {
                    return Ok(());
                }
                info!(name, repo_url, repo_rev, "installing from repo pin");
                let scratch = tempfile::tempdir()?;
                git.checkout_tree(repo_url, &tree_sha1, scratch.path())?;
                let source = match repo_subdir {
                    Some(sub) => scratch.path().join(sub),
                    None => scratch.path().to_path_buf(),
                };
                store.install(name, entry.uuid, &tree_sha1, &source)?;
                Ok(())
            }
        }
    }
}

fn name_lookup(
    project: &Project,
    registries: &[Registry],
    resolved: &BTreeMap<Uuid, crate::resolver::ResolvedEntry>,
) -> BTreeMap<Uuid, String> {
    let mut out = BTreeMap::new();
    for (name, uuid) in project.deps.iter().chain(project.extras.iter()) {
        out.insert(*uuid, name.clone());
    }
    for uuid in resolved.keys() {
        if out.contains_key(uuid) {
            continue;
        }
        for registry in registries {
            if let Some(e) = registry.entry(*uuid) {
                out.insert(*uuid, e.name.clone());
                break;
            }
        }
    }
    out
}

pub fn default_depot_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(".depotpm")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PreservationLevel;

    const REGISTRY_UUID: &str = "99999999-9999-9999-9999-999999999999";
    const A_UUID: &str = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";

    fn write_single_package_registry(depot_root: &Path) {
        let reg_dir = depot_root.join("registries").join("General");
        std::fs::create_dir_all(reg_dir.join("A")).unwrap();
        std::fs::write(
            reg_dir.join("Registry.toml"),
            format!(
                "name = \"General\"\nuuid = \"{REGISTRY_UUID}\"\n\n[packages.\"{A_UUID}\"]\nname = \"A\"\npath = \"A\"\n"
            ),
        )
        .unwrap();
        std::fs::write(
            reg_dir.join("A").join("Package.toml"),
            format!("name = \"A\"\nuuid = \"{A_UUID}\"\nrepo = \"https://example.com/A.git\"\n"),
        )
        .unwrap();
        std::fs::write(reg_dir.join("A").join("Versions.toml"), "\"1.0.0\" = \"treeA100\"\n").unwrap();
    }

    #[test]
    fn resolve_writes_a_manifest_that_reloads_to_the_same_pins() {
        let workdir = tempfile::tempdir().unwrap();
        let depot_root = tempfile::tempdir().unwrap();
        write_single_package_registry(depot_root.path());

        let project_path = workdir.path().join("Project.toml");
        std::fs::write(
            &project_path,
            format!(
                "name = \"App\"\nuuid = \"00000000-0000-0000-0000-000000000001\"\n\n[deps]\nA = \"{A_UUID}\"\n"
            ),
        )
        .unwrap();
        let manifest_path = workdir.path().join("Manifest.toml");

        let depot = Depot {
            depot_path: vec![depot_root.path().to_path_buf()],
            load_path: vec![],
            offline: false,
            concurrency: 1,
        };

        let mut ctx = Context::load(project_path, manifest_path.clone(), Version::new(1, 10, 0), depot, false).unwrap();
        ctx.resolve(&[], PreservationLevel::None).unwrap();

        assert!(manifest_path.exists());
        let reloaded = crate::manifest::Manifest::load(&manifest_path).unwrap();
        let a = reloaded
            .find(uuid::Uuid::parse_str(A_UUID).unwrap())
            .expect("A should be in the reloaded manifest");
        assert_eq!(a.1.version, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn preview_mode_never_writes_the_manifest() {
        let workdir = tempfile::tempdir().unwrap();
        let depot_root = tempfile::tempdir().unwrap();
        write_single_package_registry(depot_root.path());

        let project_path = workdir.path().join("Project.toml");
        std::fs::write(
            &project_path,
            format!(
                "name = \"App\"\nuuid = \"00000000-0000-0000-0000-000000000001\"\n\n[deps]\nA = \"{A_UUID}\"\n"
            ),
        )
        .unwrap();
        let manifest_path = workdir.path().join("Manifest.toml");

        let depot = Depot {
            depot_path: vec![depot_root.path().to_path_buf()],
            load_path: vec![],
            offline: false,
            concurrency: 1,
        };

        let mut ctx = Context::load(project_path, manifest_path.clone(), Version::new(1, 10, 0), depot, true).unwrap();
        ctx.resolve(&[], PreservationLevel::None).unwrap();

        assert!(!manifest_path.exists());
    }
}
