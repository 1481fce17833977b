//! In-memory Manifest model: parsing, cross-reference validation, pruning,
//! and the compact/expanded `deps` round-trip (`spec.md` §3 Manifest, §4.4,
//! §6).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use depotpm_schemas::manifest::{ManifestDeps, ManifestEntrySchema, ManifestSchema};
use toml_edit::Item;
use uuid::Uuid;

use crate::codec::{self, string_table};
use crate::error::{Error, Result};
use crate::project::parse_uuid;
use crate::version::{parse_version, Version};

pub const MANIFEST_FORMAT: &str = "1.0";

const HEADER: &str = "# This file is machine-generated. Editing it by hand is not recommended.\n";

#[derive(Debug, Clone)]
pub enum EntryLocation {
    /// A dev package resolved directly off disk, outside any store.
    Path(PathBuf),
    /// A registry package, addressed by the content hash of its source
    /// tree rather than a repository descriptor.
    Registry { git_tree_sha1: String },
    /// A package pinned to a revision of a repository not reachable
    /// through any registry; the revision is re-resolved to a tree by the
    /// git store at install time rather than cached here.
    Repo {
        repo_url: String,
        repo_rev: String,
        repo_subdir: Option<String>,
    },
    /// No location at all: the entry corresponds to a package bundled
    /// with the host itself, installed nowhere in the store (`spec.md`
    /// §4.3: zero location keys is legal when the entry is a stdlib).
    Stdlib,
}

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub uuid: Uuid,
    pub version: Option<Version>,
    pub location: EntryLocation,
    pub pinned: bool,
    pub deps: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub manifest_format: String,
    pub host_version: Option<Version>,
    pub packages: BTreeMap<String, Vec<ManifestEntry>>,
}

impl Manifest {
    pub fn empty() -> Self {
        Manifest {
            manifest_format: MANIFEST_FORMAT.to_string(),
            host_version: None,
            packages: BTreeMap::new(),
        }
    }

    pub fn from_str(text: &str) -> Result<Self> {
        let schema = ManifestSchema::from_str(text)?;
        Self::from_schema(schema)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    fn from_schema(schema: ManifestSchema) -> Result<Self> {
        let mut uuid_to_name: HashMap<Uuid, String> = HashMap::new();
        let mut name_uuid_pairs: Vec<(String, Uuid)> = Vec::new();
        for (name, entries) in &schema.packages {
            for e in entries {
                let uuid = parse_uuid(&e.uuid)?;
                uuid_to_name.insert(uuid, name.clone());
                name_uuid_pairs.push((name.clone(), uuid));
            }
        }
        let mut ambiguous_names: HashSet<String> = HashSet::new();
        {
            let mut seen: HashMap<&str, Uuid> = HashMap::new();
            for (name, uuid) in &name_uuid_pairs {
                match seen.get(name.as_str()) {
                    Some(existing) if *existing != *uuid => {
                        ambiguous_names.insert(name.clone());
                    }
                    _ => {
                        seen.insert(name.as_str(), *uuid);
                    }
                }
            }
        }

        let mut packages: BTreeMap<String, Vec<ManifestEntry>> = BTreeMap::new();
        for (name, entries) in &schema.packages {
            let mut out = Vec::with_capacity(entries.len());
            for e in entries {
                out.push(entry_from_schema(name, e, &uuid_to_name, &ambiguous_names)?);
            }
            packages.insert(name.clone(), out);
        }

        Ok(Manifest {
            manifest_format: schema
                .manifest_format
                .unwrap_or_else(|| MANIFEST_FORMAT.to_string()),
            host_version: schema.host_version.as_deref().map(parse_version).transpose()?,
            packages,
        })
    }

    pub fn uuid_to_name(&self) -> HashMap<Uuid, String> {
        self.packages
            .iter()
            .flat_map(|(name, entries)| entries.iter().map(move |e| (e.uuid, name.clone())))
            .collect()
    }

    pub fn find(&self, uuid: Uuid) -> Option<(&str, &ManifestEntry)> {
        self.packages.iter().find_map(|(name, entries)| {
            entries
                .iter()
                .find(|e| e.uuid == uuid)
                .map(|e| (name.as_str(), e))
        })
    }

    /// Drop every entry not reachable from `roots` by following `deps`
    /// edges, returning the uuids removed (`spec.md` §4.4 manifest
    /// pruning).
    pub fn prune_unreachable(&mut self, roots: &[Uuid]) -> Vec<Uuid> {
        let all_uuids: HashMap<Uuid, Vec<Uuid>> = self
            .packages
            .values()
            .flatten()
            .map(|e| (e.uuid, e.deps.clone()))
            .collect();

        let mut reachable: HashSet<Uuid> = HashSet::new();
        let mut stack: Vec<Uuid> = roots.to_vec();
        while let Some(u) = stack.pop() {
            if !reachable.insert(u) {
                continue;
            }
            if let Some(deps) = all_uuids.get(&u) {
                stack.extend(deps.iter().copied());
            }
        }

        let mut removed = Vec::new();
        for entries in self.packages.values_mut() {
            entries.retain(|e| {
                if reachable.contains(&e.uuid) {
                    true
                } else {
                    removed.push(e.uuid);
                    false
                }
            });
        }
        self.packages.retain(|_, entries| !entries.is_empty());
        removed
    }

    pub fn to_toml_string(&self) -> String {
        let name_for = self.uuid_to_name();
        let mut fields: Vec<(String, Item)> = Vec::new();
        fields.push((
            "manifest-format".into(),
            Item::Value(self.manifest_format.clone().into()),
        ));
        if let Some(v) = &self.host_version {
            fields.push(("host-version".into(), Item::Value(v.to_string().into())));
        }

        for (name, entries) in &self.packages {
            let mut arr = toml_edit::ArrayOfTables::new();
            for e in entries {
                arr.push(entry_to_table(e, &name_for));
            }
            fields.push((name.clone(), Item::ArrayOfTables(arr)));
        }

        let mut doc = codec::build_ordered_document(fields, &["manifest-format", "host-version"]);
        doc.as_table_mut().decor_mut().set_prefix(HEADER);
        doc.to_string()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        depotpm_util::paths::write_atomic(path, self.to_toml_string().as_bytes())?;
        Ok(())
    }
}

fn entry_from_schema(
    name: &str,
    e: &ManifestEntrySchema,
    uuid_to_name: &HashMap<Uuid, String>,
    ambiguous_names: &HashSet<String>,
) -> Result<ManifestEntry> {
    let uuid = parse_uuid(&e.uuid)?;
    let version = e.version.as_deref().map(parse_version).transpose()?;

    let has_path = e.path.is_some();
    let has_tree = e.git_tree_sha1.is_some();
    let has_repo = e.repo_url.is_some() || e.repo_rev.is_some();
    if (e.repo_url.is_some()) != (e.repo_rev.is_some()) {
        return Err(Error::InconsistentRepoDescriptor {
            name: name.to_string(),
        });
    }
    // At most one location key may appear; zero is legal too, meaning the
    // entry is a stdlib package (`spec.md` §4.3).
    if has_path as u8 + has_tree as u8 + has_repo as u8 > 1 {
        return Err(Error::AmbiguousLocation {
            name: name.to_string(),
        });
    }
    let location = if has_path {
        EntryLocation::Path(PathBuf::from(e.path.clone().unwrap()))
    } else if has_tree {
        EntryLocation::Registry {
            git_tree_sha1: e.git_tree_sha1.clone().unwrap(),
        }
    } else if has_repo {
        EntryLocation::Repo {
            repo_url: e.repo_url.clone().unwrap(),
            repo_rev: e.repo_rev.clone().unwrap(),
            repo_subdir: e.repo_subdir.clone(),
        }
    } else {
        EntryLocation::Stdlib
    };

    let deps = match &e.deps {
        ManifestDeps::Empty => Vec::new(),
        ManifestDeps::ByUuid(map) => map
            .values()
            .map(|s| parse_uuid(s))
            .collect::<Result<Vec<_>>>()?,
        ManifestDeps::Names(names) => names
            .iter()
            .map(|n| {
                if ambiguous_names.contains(n) {
                    return Err(Error::AmbiguousPackage {
                        name: n.clone(),
                        uuids: Vec::new(),
                    });
                }
                uuid_to_name
                    .iter()
                    .find(|(_, v)| v.as_str() == n)
                    .map(|(k, _)| *k)
                    .ok_or_else(|| Error::UnexpectedType {
                        key: format!("{name}.deps"),
                        expected: "a name present elsewhere in the manifest",
                    })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    Ok(ManifestEntry {
        uuid,
        version,
        location,
        pinned: e.pinned,
        deps,
    })
}

fn entry_to_table(e: &ManifestEntry, name_for: &HashMap<Uuid, String>) -> toml_edit::Table {
    let mut t = toml_edit::Table::new();
    t.insert("uuid", Item::Value(e.uuid.to_string().into()));
    if let Some(v) = &e.version {
        t.insert("version", Item::Value(v.to_string().into()));
    }
    match &e.location {
        EntryLocation::Path(p) => {
            t.insert("path", Item::Value(p.to_string_lossy().into_owned().into()));
        }
        EntryLocation::Registry { git_tree_sha1 } => {
            t.insert("git-tree-sha1", Item::Value(git_tree_sha1.clone().into()));
        }
        EntryLocation::Repo {
            repo_url,
            repo_rev,
            repo_subdir,
        } => {
            t.insert("repo-url", Item::Value(repo_url.clone().into()));
            t.insert("repo-rev", Item::Value(repo_rev.clone().into()));
            if let Some(subdir) = repo_subdir {
                t.insert("repo-subdir", Item::Value(subdir.clone().into()));
            }
        }
        EntryLocation::Stdlib => {}
    }
    if e.pinned {
        t.insert("pinned", Item::Value(true.into()));
    }
    if !e.deps.is_empty() {
        // Compact name-list form when every referenced uuid has a name
        // unique across the whole manifest; falls back to an explicit
        // name -> uuid table otherwise.
        let names: Option<Vec<String>> = e
            .deps
            .iter()
            .map(|u| name_for.get(u).cloned())
            .collect::<Option<Vec<_>>>();
        let unique = names.as_ref().is_some_and(|ns| {
            ns.iter().collect::<HashSet<_>>().len() == ns.len()
        });
        if let (Some(mut names), true) = (names, unique) {
            names.sort();
            t.insert(
                "deps",
                Item::Value(codec::string_array(names).into()),
            );
        } else {
            let pairs: Vec<(String, String)> = e
                .deps
                .iter()
                .map(|u| (name_for.get(u).cloned().unwrap_or_default(), u.to_string()))
                .collect();
            t.insert("deps", Item::Table(string_table(pairs)));
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
manifest-format = "1.0"
host-version = "1.10.0"

[[foo]]
uuid = "11111111-1111-1111-1111-111111111111"
version = "1.0.0"
git-tree-sha1 = "abc123"
deps = ["bar"]

[[bar]]
uuid = "22222222-2222-2222-2222-222222222222"
version = "2.0.0"
git-tree-sha1 = "def456"

[[baz]]
uuid = "33333333-3333-3333-3333-333333333333"
version = "3.0.0"
git-tree-sha1 = "ghi789"
"#;

    #[test]
    fn parses_entries_and_resolves_name_deps() {
        let m = Manifest::from_str(FIXTURE).unwrap();
        assert_eq!(m.packages.len(), 3);
        let (_, foo) = m
            .find(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
            .unwrap();
        assert_eq!(foo.deps, vec![Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap()]);
    }

    #[test]
    fn prune_drops_everything_unreachable_from_roots() {
        let mut m = Manifest::from_str(FIXTURE).unwrap();
        let foo = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let baz = Uuid::parse_str("33333333-3333-3333-3333-333333333333").unwrap();

        let removed = m.prune_unreachable(&[foo]);
        assert_eq!(removed, vec![baz]);
        assert!(m.find(baz).is_none());
        assert!(m.find(foo).is_some());
        // bar survives because foo depends on it.
        assert!(m
            .find(Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap())
            .is_some());
    }

    #[test]
    fn prune_with_no_roots_empties_the_manifest() {
        let mut m = Manifest::from_str(FIXTURE).unwrap();
        let removed = m.prune_unreachable(&[]);
        assert_eq!(removed.len(), 3);
        assert!(m.packages.is_empty());
    }

    #[test]
    fn round_trips_through_to_toml_string() {
        let m = Manifest::from_str(FIXTURE).unwrap();
        let rewritten = m.to_toml_string();
        let reparsed = Manifest::from_str(&rewritten).unwrap();
        assert_eq!(reparsed.host_version, m.host_version);
        assert_eq!(reparsed.packages.len(), m.packages.len());
    }

    #[test]
    fn path_and_repo_entries_cannot_also_carry_a_tree_hash() {
        let text = r#"
[[foo]]
uuid = "11111111-1111-1111-1111-111111111111"
path = "../foo"
git-tree-sha1 = "abc123"
"#;
        assert!(Manifest::from_str(text).is_err());
    }

    #[test]
    fn repo_rev_without_repo_url_is_rejected() {
        let text = r#"
[[foo]]
uuid = "11111111-1111-1111-1111-111111111111"
repo-rev = "main"
"#;
        assert!(Manifest::from_str(text).is_err());
    }

    #[test]
    fn an_entry_with_no_location_keys_is_accepted_as_stdlib() {
        let text = r#"
[[LinearAlgebra]]
uuid = "11111111-1111-1111-1111-111111111111"
"#;
        let m = Manifest::from_str(text).unwrap();
        let (_, entry) = m
            .find(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
            .unwrap();
        assert!(matches!(entry.location, EntryLocation::Stdlib));

        let rewritten = m.to_toml_string();
        let reparsed = Manifest::from_str(&rewritten).unwrap();
        let (_, reentry) = reparsed
            .find(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
            .unwrap();
        assert!(matches!(reentry.location, EntryLocation::Stdlib));
    }
}
