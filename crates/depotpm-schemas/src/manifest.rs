//! On-disk shape of the Manifest file (`spec.md` §3 "Manifest", §6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_untagged::UntaggedEnumVisitor;

/// Top-level manifest document: a machine-owned header plus one array of
/// entries per package name (more than one entry can share a name when two
/// manifest entries reference packages that happen to carry the same
/// human-readable name from different registries).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestSchema {
    #[serde(rename = "manifest-format")]
    pub manifest_format: Option<String>,

    #[serde(rename = "host-version", skip_serializing_if = "Option::is_none")]
    pub host_version: Option<String>,

    #[serde(flatten)]
    pub packages: BTreeMap<String, Vec<ManifestEntrySchema>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntrySchema {
    pub uuid: String,
    pub version: Option<String>,

    #[serde(rename = "git-tree-sha1", skip_serializing_if = "Option::is_none")]
    pub git_tree_sha1: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(rename = "repo-rev", skip_serializing_if = "Option::is_none")]
    pub repo_rev: Option<String>,
    #[serde(rename = "repo-url", skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(rename = "repo-subdir", skip_serializing_if = "Option::is_none")]
    pub repo_subdir: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,

    #[serde(default, skip_serializing_if = "ManifestDeps::is_empty")]
    pub deps: ManifestDeps,
}

/// A manifest entry's `deps` field is written compactly as a plain name list
/// when every referenced UUID maps to a uniquely-named manifest entry, and
/// as a name-to-UUID table otherwise (`spec.md` §3 Manifest, serialization
/// note). Both forms must deserialize; `serde-untagged` gives a precise
/// error instead of "data did not match any variant" when neither shape
/// matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManifestDeps {
    #[default]
    Empty,
    Names(Vec<String>),
    ByUuid(BTreeMap<String, String>),
}

impl ManifestDeps {
    pub fn is_empty(&self) -> bool {
        matches!(self, ManifestDeps::Empty)
            || matches!(self, ManifestDeps::Names(v) if v.is_empty())
            || matches!(self, ManifestDeps::ByUuid(m) if m.is_empty())
    }
}

impl<'de> Deserialize<'de> for ManifestDeps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        UntaggedEnumVisitor::new()
            .seq(|seq| seq.deserialize().map(ManifestDeps::Names))
            .map(|map| map.deserialize().map(ManifestDeps::ByUuid))
            .deserialize(deserializer)
    }
}

impl ManifestSchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, crate::SchemaError> {
        Ok(toml::to_string(self)?)
    }
}
