//! Compression: inverting "spec -> matching versions" and minimizing
//! "matching versions -> spec" over a known pool (`spec.md` §4.2).

use std::collections::BTreeMap;

use toml::Value;

use crate::error::Result;

use super::{spec_from_string, Version, VersionRange, VersionSpec};

pub type Payload = BTreeMap<String, Value>;

/// Find a minimal [`VersionSpec`] that contains every version in `subset`
/// and no version in `pool` outside of `subset` (`spec.md` §4.2
/// compress_versions). Pre-release/build suffixes are assumed already
/// stripped (`Version` never carries them).
pub fn compress_versions(pool: &[Version], subset: &[Version]) -> VersionSpec {
    let mut remaining: Vec<Version> = subset.to_vec();
    remaining.sort();
    remaining.dedup();
    let complement: Vec<Version> = pool
        .iter()
        .copied()
        .filter(|v| !remaining.contains(v))
        .collect();

    let mut accepted: Vec<VersionRange> = Vec::new();

    while let Some(&a) = remaining.first() {
        let a_triple = [a.major, a.minor, a.patch];

        let mut candidates: Vec<Version> = remaining
            .iter()
            .copied()
            .filter(|v| v.major == a.major && *v >= a)
            .collect();
        candidates.sort();
        candidates.reverse(); // largest first

        let mut accepted_this_round: Option<VersionRange> = None;
        'candidates: for b in &candidates {
            let b_triple = [b.major, b.minor, b.patch];
            for m in 1..=3usize {
                let lower = &a_triple[..m];
                for n in 1..=3usize {
                    let upper = &b_triple[..n];
                    let range = VersionRange::prefix(lower, upper);
                    if complement.iter().any(|c| range.contains(c)) {
                        continue;
                    }
                    accepted_this_round = Some(range);
                    break 'candidates;
                }
            }
        }

        let range = accepted_this_round
            .expect("the singleton range (a, a) always admits no complement element");
        accepted.push(range);
        remaining.retain(|v| !range.contains(v));
    }

    VersionSpec::from_ranges(accepted)
}

/// Expand a compressed `{spec text -> payload}` table into `{version ->
/// payload}` by deep-merging the payload of every enclosing spec onto each
/// concrete version in `pool` (`spec.md` §4.2 load). `package` names the
/// owning package for `RegistryDefect` errors only.
pub fn load_compressed(
    pool: &[Version],
    table: &BTreeMap<String, Payload>,
    package: &str,
) -> Result<BTreeMap<Version, Payload>> {
    let mut expanded: BTreeMap<Version, Payload> = BTreeMap::new();
    for (spec_text, payload) in table {
        let spec = spec_from_string(spec_text)?;
        for &v in pool.iter().filter(|v| spec.contains(v)) {
            let entry = expanded.entry(v).or_default();
            for (key, value) in payload {
                deep_merge_one(entry, key, value, v, package)?;
            }
        }
    }
    Ok(expanded)
}

fn deep_merge_one(
    entry: &mut Payload,
    key: &str,
    value: &Value,
    version: Version,
    package: &str,
) -> Result<()> {
    match entry.get(key) {
        None => {
            entry.insert(key.to_string(), value.clone());
        }
        Some(existing) if existing == value => {}
        Some(Value::Array(a)) if value.is_array() => {
            let mut merged = a.clone();
            for item in value.as_array().unwrap() {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            entry.insert(key.to_string(), Value::Array(merged));
        }
        Some(_) => {
            return Err(crate::error::Error::RegistryDefect {
                package: package.to_string(),
                version: version.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Invert `{version -> payload}` into a minimal compressed `{spec text ->
/// payload}` table (`spec.md` §4.2 compress): group by the exact set of
/// versions sharing a `(key, value)` pair, compress each group's version
/// set, then merge every `(key, value)` pair that shares a covering set
/// into one payload so the output has one entry per distinct version
/// grouping rather than one per key.
pub fn to_compressed(pool: &[Version], expanded: &BTreeMap<Version, Payload>) -> BTreeMap<String, Payload> {
    let mut by_subset: BTreeMap<Vec<Version>, Payload> = BTreeMap::new();

    // Group by (key, value): the debug-formatted value stands in for the
    // value itself so structurally-equal payloads (e.g. two equal arrays)
    // land in the same bucket.
    let mut kv_to_versions: BTreeMap<(String, String), (Vec<Version>, Value)> = BTreeMap::new();
    for (&version, payload) in expanded {
        for (key, value) in payload {
            let value_key = format!("{value:?}");
            let bucket = kv_to_versions
                .entry((key.clone(), value_key))
                .or_insert_with(|| (Vec::new(), value.clone()));
            bucket.0.push(version);
        }
    }

    for ((key, _), (mut versions, value)) in kv_to_versions {
        versions.sort();
        versions.dedup();
        by_subset.entry(versions).or_default().insert(key, value);
    }

    let mut out = BTreeMap::new();
    for (versions, payload) in by_subset {
        let spec = compress_versions(pool, &versions);
        out.insert(spec.to_string(), payload);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn pool() -> Vec<Version> {
        ["1.0.0", "1.1.0", "1.2.0", "2.0.0", "2.1.0", "3.0.0"]
            .iter()
            .map(|s| v(s))
            .collect()
    }

    #[test]
    fn compresses_a_contiguous_major_run_to_one_range() {
        let pool = pool();
        let subset = vec![v("1.0.0"), v("1.1.0"), v("1.2.0")];
        let spec = compress_versions(&pool, &subset);
        for p in &pool {
            assert_eq!(spec.contains(p), subset.contains(p), "mismatch at {p}");
        }
    }

    #[test]
    fn excludes_a_gap_in_the_middle() {
        let pool = pool();
        // 1.x and 3.x are in, 2.x is not: compress_versions must not widen
        // the spec to cover the excluded middle.
        let subset: Vec<Version> = pool
            .iter()
            .copied()
            .filter(|p| p.major != 2)
            .collect();
        let spec = compress_versions(&pool, &subset);
        for p in &pool {
            assert_eq!(spec.contains(p), subset.contains(p), "mismatch at {p}");
        }
    }

    #[test]
    fn single_version_subset_is_minimal() {
        let pool = pool();
        let subset = vec![v("2.0.0")];
        let spec = compress_versions(&pool, &subset);
        for p in &pool {
            assert_eq!(spec.contains(p), subset.contains(p), "mismatch at {p}");
        }
    }

    #[test]
    fn load_then_compress_round_trips_the_payload_assignment() {
        let pool = pool();
        let mut expanded: BTreeMap<Version, Payload> = BTreeMap::new();
        for p in &pool {
            let mut payload = Payload::new();
            let group = if p.major == 1 { "a" } else { "b" };
            payload.insert("group".to_string(), Value::String(group.to_string()));
            expanded.insert(*p, payload);
        }

        let compressed = to_compressed(&pool, &expanded);
        let reloaded = load_compressed(&pool, &compressed, "A").unwrap();
        assert_eq!(reloaded, expanded);
    }

    #[test]
    fn deep_merge_combines_array_values_across_specs() {
        let pool = vec![v("1.0.0")];
        let mut table: BTreeMap<String, Payload> = BTreeMap::new();
        let mut p1 = Payload::new();
        p1.insert(
            "keywords".to_string(),
            Value::Array(vec![Value::String("a".to_string())]),
        );
        table.insert("^1.0.0".to_string(), p1);

        let mut p2 = Payload::new();
        p2.insert(
            "keywords".to_string(),
            Value::Array(vec![Value::String("b".to_string())]),
        );
        table.insert("=1.0.0".to_string(), p2);

        let loaded = load_compressed(&pool, &table, "A").unwrap();
        let merged = loaded.get(&v("1.0.0")).unwrap();
        let Value::Array(arr) = merged.get("keywords").unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(arr.len(), 2);
    }
}
