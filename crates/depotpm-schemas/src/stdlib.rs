//! On-disk shape of a host release's bundled-library table (`spec.md` §3
//! StdlibTable).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StdlibSchema {
    /// Names bundled with the host release that carry no uuid at all —
    /// nothing outside the host itself can depend on them by uuid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unregistered: Vec<String>,

    #[serde(flatten)]
    pub packages: BTreeMap<String, StdlibPackageSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdlibPackageSchema {
    pub uuid: String,
    pub version: Option<String>,
}

impl StdlibSchema {
    pub fn from_str(text: &str) -> Result<Self, crate::SchemaError> {
        Ok(toml::from_str(text)?)
    }
}
