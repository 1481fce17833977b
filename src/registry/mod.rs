//! A single on-disk registry tree: the package index plus per-package
//! `Versions`/`Deps`/`Compat` files (`spec.md` §3 Registry, §4.2, §4.4).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use depotpm_schemas::registry::{
    CompressedTableSchema, PackageIdentitySchema, RegistrySchema, VersionsSchema,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::project::parse_uuid;
use crate::version::{load_compressed, spec_from_string, Version, VersionSpec};

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct VersionMeta {
    pub tree_sha1: String,
    pub yanked: bool,
}

#[derive(Debug, Clone)]
pub struct Registry {
    pub name: String,
    pub uuid: Uuid,
    pub repo_url: Option<String>,
    pub description: Option<String>,
    root: PathBuf,
    index: BTreeMap<Uuid, IndexEntry>,
}

impl Registry {
    pub fn load(root: &Path) -> Result<Registry> {
        let text = std::fs::read_to_string(root.join("Registry.toml"))?;
        let schema = RegistrySchema::from_str(&text)?;

        let mut index = BTreeMap::new();
        for (uuid_str, entry) in schema.packages {
            let uuid = parse_uuid(&uuid_str)?;
            index.insert(
                uuid,
                IndexEntry {
                    name: entry.name,
                    path: entry.path,
                },
            );
        }

        Ok(Registry {
            name: schema.name,
            uuid: parse_uuid(&schema.uuid)?,
            repo_url: schema.repo_url,
            description: schema.description,
            root: root.to_path_buf(),
            index,
        })
    }

    pub fn registered_uuids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.index.keys().copied()
    }

    pub fn registered_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.index.values().map(|e| e.name.as_str())
    }

    pub fn registered_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.index.values().map(|e| e.path.as_str())
    }

    pub fn entry(&self, uuid: Uuid) -> Option<&IndexEntry> {
        self.index.get(&uuid)
    }

    /// Every uuid registered under `name`; more than one element means the
    /// name is ambiguous within this registry alone (`spec.md` §4.4
    /// AmbiguousPackage).
    pub fn find_by_name(&self, name: &str) -> Vec<Uuid> {
        self.index
            .iter()
            .filter(|(_, e)| e.name == name)
            .map(|(u, _)| *u)
            .collect()
    }

    fn package_dir(&self, uuid: Uuid) -> Result<PathBuf> {
        let entry = self.entry(uuid).ok_or_else(|| Error::UnexpectedType {
            key: format!("registry[{}]", self.name),
            expected: "a uuid present in the package index",
        })?;
        Ok(self.root.join(&entry.path))
    }

    pub fn package_identity(&self, uuid: Uuid) -> Result<PackageIdentitySchema> {
        let text = std::fs::read_to_string(self.package_dir(uuid)?.join("Package.toml"))?;
        Ok(PackageIdentitySchema::from_str(&text)?)
    }

    pub fn versions(&self, uuid: Uuid) -> Result<BTreeMap<Version, VersionMeta>> {
        let path = self.package_dir(uuid)?.join("Versions.toml");
        let text = std::fs::read_to_string(&path)?;
        let schema = VersionsSchema::from_str(&text)?;

        let mut out = BTreeMap::new();
        for (v_str, entry) in schema.versions {
            let v = crate::version::parse_version(&v_str)?;
            out.insert(
                v,
                VersionMeta {
                    tree_sha1: entry.tree_sha1().to_string(),
                    yanked: entry.is_yanked(),
                },
            );
        }
        Ok(out)
    }

    /// Non-yanked versions, the pool most resolver/stdlib queries want.
    pub fn live_versions(&self, uuid: Uuid) -> Result<Vec<Version>> {
        Ok(self
            .versions(uuid)?
            .into_iter()
            .filter(|(_, m)| !m.yanked)
            .map(|(v, _)| v)
            .collect())
    }

    fn package_name(&self, uuid: Uuid) -> String {
        self.entry(uuid)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| uuid.to_string())
    }

    fn load_compressed_table(
        &self,
        uuid: Uuid,
        filename: &str,
        pool: &[Version],
    ) -> Result<BTreeMap<Version, BTreeMap<String, toml::Value>>> {
        let path = self.package_dir(uuid)?.join(filename);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = std::fs::read_to_string(&path)?;
        let schema = CompressedTableSchema::from_str(&text)?;
        load_compressed(pool, &schema.entries, &self.package_name(uuid))
    }

    pub fn deps_at(&self, uuid: Uuid, version: Version) -> Result<BTreeMap<String, Uuid>> {
        let pool: Vec<Version> = self.versions(uuid)?.into_keys().collect();
        let table = self.load_compressed_table(uuid, "Deps.toml", &pool)?;
        let payload = table.get(&version).cloned().unwrap_or_default();
        payload
            .into_iter()
            .map(|(name, value)| {
                let uuid_str = value.as_str().ok_or_else(|| Error::RegistryDefect {
                    package: name.clone(),
                    version: version.to_string(),
                    key: "deps".into(),
                })?;
                Ok((name, parse_uuid(uuid_str)?))
            })
            .collect()
    }

    pub fn compat_at(&self, uuid: Uuid, version: Version) -> Result<BTreeMap<String, VersionSpec>> {
        let pool: Vec<Version> = self.versions(uuid)?.into_keys().collect();
        let table = self.load_compressed_table(uuid, "Compat.toml", &pool)?;
        let payload = table.get(&version).cloned().unwrap_or_default();
        payload
            .into_iter()
            .map(|(name, value)| {
                let spec_str = value.as_str().ok_or_else(|| Error::RegistryDefect {
                    package: name.clone(),
                    version: version.to_string(),
                    key: "compat".into(),
                })?;
                Ok((name, spec_from_string(spec_str)?))
            })
            .collect()
    }
}
