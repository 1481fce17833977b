//! On-disk shapes of a registry tree (`spec.md` §3 "Registry", §6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The top-level `Registry` file: identity plus a flat package index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySchema {
    pub name: String,
    pub uuid: String,
    #[serde(rename = "repo")]
    pub repo_url: Option<String>,
    pub description: Option<String>,
    pub packages: BTreeMap<String, RegistryIndexEntrySchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryIndexEntrySchema {
    pub name: String,
    pub path: String,
}

/// A package's own `Package` identity file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentitySchema {
    pub name: String,
    pub uuid: String,
    #[serde(rename = "repo")]
    pub repo_url: String,
}

/// A package's `Versions` file: version string -> tree SHA-1, plus an
/// optional yanked marker colocated per `SPEC_FULL.md` §3's registry
/// supplement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionsSchema {
    #[serde(flatten)]
    pub versions: BTreeMap<String, VersionEntrySchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionEntrySchema {
    /// The common case: just the tree hash.
    TreeHash(String),
    /// The yanked case: hash plus an explicit marker.
    Yanked {
        #[serde(rename = "git-tree-sha1")]
        git_tree_sha1: String,
        yanked: bool,
    },
}

impl VersionEntrySchema {
    pub fn tree_sha1(&self) -> &str {
        match self {
            VersionEntrySchema::TreeHash(h) => h,
            VersionEntrySchema::Yanked { git_tree_sha1, .. } => git_tree_sha1,
        }
    }

    pub fn is_yanked(&self) -> bool {
        matches!(self, VersionEntrySchema::Yanked { yanked: true, .. })
    }
}

/// Compressed `Deps`/`Compat` file: VersionSpec text -> flat payload
/// dictionary (`spec.md` §4.2). The payload shape is deliberately untyped
/// here — `Deps` payloads are name->uuid-string, `Compat` payloads are
/// name->semver-spec-string — the main crate interprets the dictionary for
/// each file kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressedTableSchema {
    #[serde(flatten)]
    pub entries: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl RegistrySchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }
}

impl PackageIdentitySchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }
}

impl VersionsSchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }
}

impl CompressedTableSchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }
}
