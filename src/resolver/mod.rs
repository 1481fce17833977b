//! Dependency resolution (`spec.md` §3 Resolver, §4.4, §9).
//!
//! This performs a single deterministic pass rather than a full
//! conflict-driven backtracking search: requirements are accumulated
//! bottom-up as packages are visited, a package is assigned the
//! highest (or preserved, depending on level) version that satisfies every
//! constraint seen so far, and a constraint that can't be met by anything
//! in the pool is reported immediately rather than triggering a search
//! over the alternatives already committed. This covers the common case —
//! and gives a precise conflict explanation — without the cost of a true
//! SAT-style solver; see DESIGN.md for the tradeoff this makes against
//! `spec.md`'s fuller resolver description.

use std::collections::{BTreeMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::manifest::{EntryLocation, Manifest};
use crate::project::Project;
use crate::registry::Registry;
use crate::stdlib::StdlibTable;
use crate::version::{spec_from_string, Version, VersionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservationLevel {
    All,
    Direct,
    Semver,
    None,
    Tiered,
}

#[derive(Debug, Clone)]
pub enum ResolvedSource {
    Registry { registry_uuid: Uuid, tree_sha1: String },
    Path(std::path::PathBuf),
    Repo {
        repo_url: String,
        repo_rev: String,
        repo_subdir: Option<String>,
    },
    Stdlib,
}

#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub uuid: Uuid,
    pub version: Option<Version>,
    pub source: ResolvedSource,
    pub deps: Vec<Uuid>,
}

pub struct Resolver<'a> {
    registries: &'a [Registry],
    stdlib: &'a StdlibTable,
    host: Version,
}

fn unbounded_spec() -> VersionSpec {
    spec_from_string("\u{2265}0").expect("'\u{2265}0' is always a valid spec")
}

impl<'a> Resolver<'a> {
    pub fn new(registries: &'a [Registry], stdlib: &'a StdlibTable, host: Version) -> Self {
        Resolver {
            registries,
            stdlib,
            host,
        }
    }

    fn find_registry(&self, uuid: Uuid) -> Option<&Registry> {
        self.registries.iter().find(|r| r.entry(uuid).is_some())
    }

    pub fn resolve(
        &self,
        project: &Project,
        manifest: &Manifest,
        active_targets: &[String],
        level: PreservationLevel,
    ) -> Result<BTreeMap<Uuid, ResolvedEntry>> {
        if level == PreservationLevel::Tiered {
            let mut last_err = None;
            for lvl in [
                PreservationLevel::All,
                PreservationLevel::Direct,
                PreservationLevel::Semver,
                PreservationLevel::None,
            ] {
                match self.resolve_at_level(project, manifest, active_targets, lvl) {
                    Ok(r) => return Ok(r),
                    Err(e) => last_err = Some(e),
                }
            }
            return Err(last_err.expect("the loop above always runs at least once"));
        }
        self.resolve_at_level(project, manifest, active_targets, level)
    }

    fn resolve_at_level(
        &self,
        project: &Project,
        manifest: &Manifest,
        active_targets: &[String],
        level: PreservationLevel,
    ) -> Result<BTreeMap<Uuid, ResolvedEntry>> {
        let root_names = project.active_dep_names(active_targets);
        let roots: HashSet<Uuid> = root_names
            .iter()
            .filter_map(|n| project.uuid_for(n))
            .collect();

        let manifest_by_uuid: BTreeMap<Uuid, (&str, &crate::manifest::ManifestEntry)> = manifest
            .packages
            .iter()
            .flat_map(|(name, entries)| entries.iter().map(move |e| (e.uuid, (name.as_str(), e))))
            .collect();

        let mut constraints: BTreeMap<Uuid, VersionSpec> = BTreeMap::new();
        for (name, uuid) in project.deps.iter().chain(project.extras.iter()) {
            if let Some(compat) = project.compat.get(name) {
                constraints.insert(*uuid, compat.spec.clone());
            }
        }

        let mut resolved: BTreeMap<Uuid, ResolvedEntry> = BTreeMap::new();
        let mut queue: VecDeque<Uuid> = roots.iter().copied().collect();
        let mut queued: HashSet<Uuid> = roots.iter().copied().collect();

        while let Some(uuid) = queue.pop_front() {
            if resolved.contains_key(&uuid) {
                continue;
            }

            let (entry, dep_constraints) = self.resolve_one(
                uuid,
                constraints.get(&uuid).cloned().unwrap_or_else(unbounded_spec),
                manifest_by_uuid.get(&uuid).map(|(_, e)| *e),
                roots.contains(&uuid),
                level,
            )?;

            for dep in &entry.deps {
                let dep_constraint = dep_constraints.get(dep).cloned().unwrap_or_else(unbounded_spec);
                let slot = constraints.entry(*dep).or_insert_with(unbounded_spec);
                *slot = slot.intersect(&dep_constraint);
                if queued.insert(*dep) {
                    queue.push_back(*dep);
                }
            }

            resolved.insert(uuid, entry);
        }

        Ok(resolved)
    }

    /// Resolve a single package, returning its entry plus the per-dependency
    /// compat constraint each of its own deps should be filtered by.
    fn resolve_one(
        &self,
        uuid: Uuid,
        constraint: VersionSpec,
        existing: Option<&crate::manifest::ManifestEntry>,
        is_root: bool,
        level: PreservationLevel,
    ) -> Result<(ResolvedEntry, BTreeMap<Uuid, VersionSpec>)> {
        if let Some(e) = existing {
            match &e.location {
                EntryLocation::Path(p) => {
                    return Ok((
                        ResolvedEntry {
                            uuid,
                            version: e.version,
                            source: ResolvedSource::Path(p.clone()),
                            deps: e.deps.clone(),
                        },
                        BTreeMap::new(),
                    ));
                }
                EntryLocation::Repo {
                    repo_url,
                    repo_rev,
                    repo_subdir,
                } => {
                    return Ok((
                        ResolvedEntry {
                            uuid,
                            version: e.version,
                            source: ResolvedSource::Repo {
                                repo_url: repo_url.clone(),
                                repo_rev: repo_rev.clone(),
                                repo_subdir: repo_subdir.clone(),
                            },
                            deps: e.deps.clone(),
                        },
                        BTreeMap::new(),
                    ));
                }
                EntryLocation::Stdlib => {
                    return Ok((
                        ResolvedEntry {
                            uuid,
                            version: e.version,
                            source: ResolvedSource::Stdlib,
                            deps: e.deps.clone(),
                        },
                        BTreeMap::new(),
                    ));
                }
                EntryLocation::Registry { .. } => {}
            }
        }

        let registry = match self.find_registry(uuid) {
            Some(r) => r,
            None => {
                if self.stdlib_covers(uuid) {
                    return Ok((
                        ResolvedEntry {
                            uuid,
                            version: None,
                            source: ResolvedSource::Stdlib,
                            deps: Vec::new(),
                        },
                        BTreeMap::new(),
                    ));
                }
                return Err(Error::Unsatisfiable {
                    package: uuid.to_string(),
                    summary: String::from("not found in any reachable registry or stdlib table"),
                });
            }
        };

        let pool = registry.live_versions(uuid)?;
        let mut by_constraint: Vec<Version> = pool.iter().copied().filter(|v| constraint.contains(v)).collect();
        by_constraint.sort();
        if by_constraint.is_empty() {
            return Err(unsatisfiable(registry, uuid, &constraint, &pool));
        }

        // §4.6 step 1: only candidates whose own `julia` compat entry
        // admits the host version are eligible at all.
        let mut candidates: Vec<Version> = Vec::with_capacity(by_constraint.len());
        for v in &by_constraint {
            if self.host_compatible(registry, uuid, *v)? {
                candidates.push(*v);
            }
        }
        if candidates.is_empty() {
            let newest = *by_constraint.last().expect("checked non-empty above");
            let spec = registry
                .compat_at(uuid, newest)?
                .get(crate::project::HOST_COMPAT_KEY)
                .cloned()
                .unwrap_or_else(unbounded_spec);
            return Err(Error::IncompatibleHost {
                spec,
                host: self.host.to_string(),
            });
        }

        let preserved = existing.and_then(|e| e.version);
        let chosen = match (level, preserved) {
            (PreservationLevel::All, Some(v)) if candidates.contains(&v) => v,
            (PreservationLevel::Direct, Some(v)) if is_root && candidates.contains(&v) => v,
            (PreservationLevel::Semver, Some(v)) => candidates
                .iter()
                .rev()
                .find(|c| c.major == v.major)
                .copied()
                .or_else(|| candidates.last().copied())
                .ok_or(())
                .map_err(|_| unsatisfiable(registry, uuid, &constraint, &pool))?,
            _ => candidates
                .last()
                .copied()
                .ok_or(())
                .map_err(|_| unsatisfiable(registry, uuid, &constraint, &pool))?,
        };

        let deps_map = registry.deps_at(uuid, chosen)?;
        let compat_map = registry.compat_at(uuid, chosen)?;
        let deps: Vec<Uuid> = deps_map.values().copied().collect();
        let dep_constraints: BTreeMap<Uuid, VersionSpec> = deps_map
            .iter()
            .filter_map(|(name, dep_uuid)| compat_map.get(name).map(|spec| (*dep_uuid, spec.clone())))
            .collect();

        let tree_sha1 = registry
            .versions(uuid)?
            .get(&chosen)
            .map(|m| m.tree_sha1.clone())
            .unwrap_or_default();

        Ok((
            ResolvedEntry {
                uuid,
                version: Some(chosen),
                source: ResolvedSource::Registry {
                    registry_uuid: registry.uuid,
                    tree_sha1,
                },
                deps,
            },
            dep_constraints,
        ))
    }

    /// Whether `version`'s own `julia` compat entry admits `self.host`
    /// (`spec.md` §4.6 step 1). Absent means unconstrained.
    fn host_compatible(&self, registry: &Registry, uuid: Uuid, version: Version) -> Result<bool> {
        let compat = registry.compat_at(uuid, version)?;
        Ok(match compat.get(crate::project::HOST_COMPAT_KEY) {
            Some(spec) => spec.contains(&self.host),
            None => true,
        })
    }

    /// `true` if `uuid` is bundled with the current host release, or ever
    /// was with some other known release (the free-floating case where a
    /// dependency on a stdlib name isn't pinned to one host version).
    fn stdlib_covers(&self, uuid: Uuid) -> bool {
        if let Some(table) = self.stdlib.for_host(&self.host) {
            if table.packages.values().any(|(u, _)| *u == uuid) {
                return true;
            }
        }
        self.stdlib
            .known_hosts()
            .any(|h| self.stdlib.for_host(h).is_some_and(|t| t.packages.values().any(|(u, _)| *u == uuid)))
    }
}


fn unsatisfiable(registry: &Registry, uuid: Uuid, constraint: &VersionSpec, pool: &[Version]) -> Error {
    let name = registry
        .entry(uuid)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| uuid.to_string());
    Error::Unsatisfiable {
        package: name,
        summary: format!(
            "no version among {{{}}} satisfies {constraint}",
            pool.iter().map(Version::to_string).collect::<Vec<_>>().join(", ")
        ),
    }
}
