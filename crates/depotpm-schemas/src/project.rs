//! On-disk shape of the Project file (`spec.md` §3 "Project", §6).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw, loosely-typed view of a Project file. Values are left as strings
/// here (a UUID is just 36 characters to this crate); the main crate parses
/// them into `Version`/`VersionSpec`/`Uuid` and validates cross-field
/// invariants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSchema {
    pub name: Option<String>,
    pub uuid: Option<String>,
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub license: Option<String>,
    pub desc: Option<String>,
    pub authors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub deps: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub compat: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extras: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub targets: IndexMap<String, Vec<String>>,

    /// Every top-level key this schema doesn't know about, preserved
    /// verbatim so `write(parse(f))` round-trips (`spec.md` §8 invariant 3).
    #[serde(flatten)]
    pub unknown: toml::value::Table,
}

impl ProjectSchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, crate::SchemaError> {
        Ok(toml::to_string(self)?)
    }
}
