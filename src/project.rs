//! In-memory Project model and its TOML round-trip (`spec.md` §3 Project,
//! §4.3, §6).

use std::collections::HashSet;
use std::path::Path;

use depotpm_schemas::project::ProjectSchema;
use indexmap::IndexMap;
use toml_edit::Item;
use uuid::Uuid;

use crate::codec::{self, PROJECT_KEY_ORDER};
use crate::error::{Error, Result};
use crate::version::{parse_version, spec_from_string, Version, VersionSpec};

/// The literal on-disk compat key for the host-language version
/// constraint; always present after parsing, even if the file omits it
/// (`spec.md` §3: "a `julia` ... entry is always synthesized").
pub const HOST_COMPAT_KEY: &str = "julia";

#[derive(Debug, Clone)]
pub struct SelfIdentity {
    pub name: String,
    pub uuid: Uuid,
    pub version: Option<Version>,
}

#[derive(Debug, Clone)]
pub struct CompatEntry {
    pub raw: String,
    pub spec: VersionSpec,
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    pub self_identity: Option<SelfIdentity>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub license: Option<String>,
    pub desc: Option<String>,
    pub deps: IndexMap<String, Uuid>,
    pub compat: IndexMap<String, CompatEntry>,
    pub extras: IndexMap<String, Uuid>,
    pub targets: IndexMap<String, Vec<String>>,
    unknown: toml::value::Table,
}

impl Project {
    pub fn from_str(text: &str) -> Result<Self> {
        let schema = ProjectSchema::from_str(text)?;
        Self::from_schema(schema)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    fn from_schema(schema: ProjectSchema) -> Result<Self> {
        let self_identity = match (&schema.name, &schema.uuid) {
            (Some(name), Some(uuid)) => Some(SelfIdentity {
                name: name.clone(),
                uuid: parse_uuid(uuid)?,
                version: schema.version.as_deref().map(parse_version).transpose()?,
            }),
            (None, None) => None,
            _ => return Err(Error::InsufficientPackageKeys),
        };

        let mut deps = IndexMap::new();
        for (name, uuid) in &schema.deps {
            deps.insert(name.clone(), parse_uuid(uuid)?);
        }

        let mut extras = IndexMap::new();
        for (name, uuid) in &schema.extras {
            extras.insert(name.clone(), parse_uuid(uuid)?);
        }

        let mut compat = IndexMap::new();
        for (name, raw) in &schema.compat {
            let spec = spec_from_string(raw)?;
            compat.insert(
                name.clone(),
                CompatEntry {
                    raw: raw.clone(),
                    spec,
                },
            );
        }
        compat
            .entry(HOST_COMPAT_KEY.to_string())
            .or_insert_with(|| CompatEntry {
                raw: String::from("\u{2265}0"),
                spec: spec_from_string("\u{2265}0").unwrap(),
            });

        let known_names: HashSet<&str> = deps
            .keys()
            .map(String::as_str)
            .chain(extras.keys().map(String::as_str))
            .chain(std::iter::once(HOST_COMPAT_KEY))
            .collect();
        for name in compat.keys() {
            if !known_names.contains(name.as_str()) {
                return Err(Error::UnexpectedType {
                    key: format!("compat.{name}"),
                    expected: "a name present in deps, extras, or the host-language entry",
                });
            }
        }

        for (target, names) in &schema.targets {
            for name in names {
                if !deps.contains_key(name) && !extras.contains_key(name) {
                    return Err(Error::UnexpectedType {
                        key: format!("targets.{target}"),
                        expected: "dependency names drawn from deps or extras",
                    });
                }
            }
        }

        Ok(Project {
            self_identity,
            authors: schema.authors.unwrap_or_default(),
            keywords: schema.keywords,
            license: schema.license,
            desc: schema.desc,
            deps,
            compat,
            extras,
            targets: schema.targets,
            unknown: schema.unknown,
        })
    }

    /// Dependency names made visible to the resolver by at least one of
    /// `active_targets` (`SPEC_FULL.md` §3 extras visibility supplement).
    /// Always includes `deps` itself; an extra not reachable from any
    /// active target is omitted even though it round-trips on save.
    pub fn active_dep_names(&self, active_targets: &[String]) -> HashSet<String> {
        let mut names: HashSet<String> = self.deps.keys().cloned().collect();
        for target in active_targets {
            if let Some(list) = self.targets.get(target) {
                for n in list {
                    if self.extras.contains_key(n) {
                        names.insert(n.clone());
                    }
                }
            }
        }
        names
    }

    pub fn uuid_for(&self, name: &str) -> Option<Uuid> {
        self.deps
            .get(name)
            .or_else(|| self.extras.get(name))
            .copied()
            .or_else(|| {
                self.self_identity
                    .as_ref()
                    .filter(|s| s.name == name)
                    .map(|s| s.uuid)
            })
    }

    pub fn to_toml_string(&self) -> String {
        let mut fields: Vec<(String, Item)> = Vec::new();

        if let Some(id) = &self.self_identity {
            fields.push(("name".into(), Item::Value(id.name.clone().into())));
            fields.push(("uuid".into(), Item::Value(id.uuid.to_string().into())));
            if let Some(v) = &id.version {
                fields.push(("version".into(), Item::Value(v.to_string().into())));
            }
        }
        if !self.authors.is_empty() {
            fields.push((
                "authors".into(),
                Item::Value(codec::string_array(self.authors.clone()).into()),
            ));
        }
        if !self.keywords.is_empty() {
            fields.push((
                "keywords".into(),
                Item::Value(codec::string_array(self.keywords.clone()).into()),
            ));
        }
        if let Some(l) = &self.license {
            fields.push(("license".into(), Item::Value(l.clone().into())));
        }
        if let Some(d) = &self.desc {
            fields.push(("desc".into(), Item::Value(d.clone().into())));
        }
        if !self.deps.is_empty() {
            let t = codec::string_table(
                self.deps
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string())),
            );
            fields.push(("deps".into(), Item::Table(t)));
        }
        // The host-language entry is always present in memory (synthesized
        // if the file omitted it), so `compat` is never actually empty here.
        let t = codec::string_table(
            self.compat.iter().map(|(k, v)| (k.clone(), v.raw.clone())),
        );
        fields.push(("compat".into(), Item::Table(t)));
        if !self.extras.is_empty() {
            let t = codec::string_table(
                self.extras
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string())),
            );
            fields.push(("extras".into(), Item::Table(t)));
        }
        if !self.targets.is_empty() {
            let mut t = toml_edit::Table::new();
            for (k, v) in &self.targets {
                t.insert(k, Item::Value(codec::string_array(v.clone()).into()));
            }
            fields.push(("targets".into(), Item::Table(t)));
        }
        for (k, v) in &self.unknown {
            fields.push((k.clone(), codec::value_to_item(v)));
        }

        let doc = codec::build_ordered_document(fields, PROJECT_KEY_ORDER);
        doc.to_string()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        depotpm_util::paths::write_atomic(path, self.to_toml_string().as_bytes())?;
        Ok(())
    }
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| Error::BadSpec {
        kind: "uuid",
        text: s.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
name = "Widget"
uuid = "11111111-1111-1111-1111-111111111111"
version = "0.1.0"

[deps]
Gadget = "22222222-2222-2222-2222-222222222222"

[compat]
Gadget = "^1.0.0"
"#;

    #[test]
    fn host_compat_entry_is_synthesized_when_absent() {
        let p = Project::from_str(FIXTURE).unwrap();
        assert!(p.compat.contains_key(HOST_COMPAT_KEY));
        assert_eq!(p.compat[HOST_COMPAT_KEY].raw, "\u{2265}0");
    }

    #[test]
    fn explicit_host_compat_entry_is_kept_verbatim() {
        let text = r#"
name = "Widget"
uuid = "11111111-1111-1111-1111-111111111111"

[deps]
Gadget = "22222222-2222-2222-2222-222222222222"

[compat]
Gadget = "^1.0.0"
julia = "^1.9"
"#;
        let p = Project::from_str(text).unwrap();
        assert_eq!(p.compat[HOST_COMPAT_KEY].raw, "^1.9");
    }

    #[test]
    fn compat_entry_for_unknown_name_is_rejected() {
        let text = r#"
name = "Widget"
uuid = "11111111-1111-1111-1111-111111111111"

[compat]
NotADep = "^1.0.0"
"#;
        assert!(Project::from_str(text).is_err());
    }

    #[test]
    fn name_without_uuid_is_rejected() {
        let text = r#"
name = "Widget"
"#;
        assert!(Project::from_str(text).is_err());
    }

    #[test]
    fn target_referencing_unknown_dep_is_rejected() {
        let text = r#"
name = "Widget"
uuid = "11111111-1111-1111-1111-111111111111"

[targets]
test = ["NotADep"]
"#;
        assert!(Project::from_str(text).is_err());
    }

    #[test]
    fn extras_are_visible_only_through_an_active_target() {
        let text = r#"
name = "Widget"
uuid = "11111111-1111-1111-1111-111111111111"

[extras]
TestHelper = "33333333-3333-3333-3333-333333333333"

[targets]
test = ["TestHelper"]
"#;
        let p = Project::from_str(text).unwrap();
        assert!(!p.active_dep_names(&[]).contains("TestHelper"));
        assert!(p
            .active_dep_names(&["test".to_string()])
            .contains("TestHelper"));
    }

    #[test]
    fn round_trips_through_to_toml_string() {
        let p = Project::from_str(FIXTURE).unwrap();
        let rewritten = p.to_toml_string();
        let reparsed = Project::from_str(&rewritten).unwrap();
        assert_eq!(reparsed.self_identity.unwrap().name, "Widget");
        assert_eq!(reparsed.deps.get("Gadget"), p.deps.get("Gadget"));
    }
}
