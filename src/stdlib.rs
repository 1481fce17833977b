//! Per-host-release bundled library table (`spec.md` §3 StdlibTable,
//! §4.4 resolver interaction).
//!
//! Laid out on disk as one directory per host version under a root path,
//! each holding a `Stdlib.toml`; `StdlibTable::load` reads every directory
//! it finds rather than requiring the caller to enumerate host versions up
//! front, the same "scan what's there" approach `registry::Registry`
//! takes for package directories.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use depotpm_schemas::stdlib::StdlibSchema;
use uuid::Uuid;

use crate::error::Result;
use crate::project::parse_uuid;
use crate::version::{parse_version, Version};

#[derive(Debug, Clone)]
pub struct HostStdlib {
    pub packages: BTreeMap<String, (Uuid, Option<Version>)>,
    pub unregistered: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StdlibTable {
    by_host: BTreeMap<Version, HostStdlib>,
}

impl StdlibTable {
    pub fn load(root: &Path) -> Result<StdlibTable> {
        let mut by_host = BTreeMap::new();
        if !root.exists() {
            return Ok(StdlibTable { by_host });
        }
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let host = match entry.file_name().to_str().map(parse_version) {
                Some(Ok(v)) => v,
                _ => continue,
            };
            let file = entry.path().join("Stdlib.toml");
            if !file.exists() {
                continue;
            }
            let schema = StdlibSchema::from_str(&std::fs::read_to_string(file)?)?;

            let mut packages = BTreeMap::new();
            for (name, pkg) in schema.packages {
                let uuid = parse_uuid(&pkg.uuid)?;
                let version = pkg.version.as_deref().map(parse_version).transpose()?;
                packages.insert(name, (uuid, version));
            }
            by_host.insert(
                host,
                HostStdlib {
                    packages,
                    unregistered: schema.unregistered.into_iter().collect(),
                },
            );
        }
        Ok(StdlibTable { by_host })
    }

    /// The entry for the largest known host version `<= host` (`spec.md`
    /// §3, §4.5): a table keyed at 1.6 still covers a 1.7 host.
    pub fn for_host(&self, host: &Version) -> Option<&HostStdlib> {
        self.by_host.range(..=*host).next_back().map(|(_, h)| h)
    }

    pub fn known_hosts(&self) -> impl Iterator<Item = &Version> {
        self.by_host.keys()
    }

    pub fn uuid_for(&self, host: &Version, name: &str) -> Option<Uuid> {
        self.for_host(host)?.packages.get(name).map(|(u, _)| *u)
    }

    pub fn is_unregistered(&self, host: &Version, name: &str) -> bool {
        self.for_host(host)
            .is_some_and(|h| h.unregistered.contains(name))
    }

    /// All `(uuid, version)` pairs ever bundled under `name`, across every
    /// host release this table knows about — used when a dependency on a
    /// stdlib name isn't pinned to one host release and has to be resolved
    /// against the union of everything that ever shipped under that name.
    pub fn all_versions_for(&self, name: &str) -> BTreeMap<Uuid, HashSet<Version>> {
        let mut out: BTreeMap<Uuid, HashSet<Version>> = BTreeMap::new();
        for host in self.by_host.values() {
            if let Some((uuid, version)) = host.packages.get(name) {
                let versions = out.entry(*uuid).or_default();
                if let Some(v) = version {
                    versions.insert(*v);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_host(root: &Path, host: &str, toml: &str) {
        let dir = root.join(host);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Stdlib.toml"), toml).unwrap();
    }

    #[test]
    fn loads_one_table_per_host_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_host(
            dir.path(),
            "1.9.0",
            r#"
unregistered = ["Core"]

[Sockets]
uuid = "11111111-1111-1111-1111-111111111111"
version = "1.9.0"
"#,
        );
        write_host(
            dir.path(),
            "1.10.0",
            r#"
[Sockets]
uuid = "11111111-1111-1111-1111-111111111111"
version = "1.10.0"
"#,
        );

        let table = StdlibTable::load(dir.path()).unwrap();
        assert_eq!(table.known_hosts().count(), 2);

        let host_1_9 = "1.9.0".parse::<Version>().unwrap();
        assert!(table.is_unregistered(&host_1_9, "Core"));
        assert_eq!(
            table.uuid_for(&host_1_9, "Sockets"),
            Some(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
        );
    }

    #[test]
    fn all_versions_for_unions_across_every_known_host() {
        let dir = tempfile::tempdir().unwrap();
        let uuid = "11111111-1111-1111-1111-111111111111";
        write_host(
            dir.path(),
            "1.9.0",
            &format!("[Sockets]\nuuid = \"{uuid}\"\nversion = \"1.9.0\"\n"),
        );
        write_host(
            dir.path(),
            "1.10.0",
            &format!("[Sockets]\nuuid = \"{uuid}\"\nversion = \"1.10.0\"\n"),
        );

        let table = StdlibTable::load(dir.path()).unwrap();
        let versions = table.all_versions_for("Sockets");
        let uuid = Uuid::parse_str(uuid).unwrap();
        assert_eq!(versions.len(), 1);
        let vs = &versions[&uuid];
        assert!(vs.contains(&"1.9.0".parse::<Version>().unwrap()));
        assert!(vs.contains(&"1.10.0".parse::<Version>().unwrap()));
    }

    #[test]
    fn for_host_falls_back_to_the_largest_table_at_or_below_the_host_version() {
        let dir = tempfile::tempdir().unwrap();
        let uuid = "11111111-1111-1111-1111-111111111111";
        write_host(
            dir.path(),
            "1.6.0",
            &format!("[GMP_jll]\nuuid = \"{uuid}\"\nversion = \"1.6.0\"\n"),
        );

        let table = StdlibTable::load(dir.path()).unwrap();
        // No table is keyed at 1.7 exactly; the 1.6 table still covers it.
        let host_1_7 = "1.7.0".parse::<Version>().unwrap();
        assert_eq!(
            table.uuid_for(&host_1_7, "GMP_jll"),
            Some(Uuid::parse_str(uuid).unwrap())
        );

        // A host older than every known table has nothing to fall back on.
        let host_1_0 = "1.0.0".parse::<Version>().unwrap();
        assert!(table.for_host(&host_1_0).is_none());
    }

    #[test]
    fn missing_root_yields_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let table = StdlibTable::load(&missing).unwrap();
        assert_eq!(table.known_hosts().count(), 0);
    }
}
