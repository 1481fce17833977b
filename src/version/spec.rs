use std::fmt;

use crate::error::Result;

use super::{bad_spec, parse_components, Version, VersionRange};

/// An ordered set of disjoint [`VersionRange`]s (`spec.md` §3 VersionSpec).
/// Comma-separated items in the textual grammar union together; a single
/// item describes one contiguous range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSpec {
    ranges: Vec<VersionRange>,
}

impl VersionSpec {
    pub fn empty() -> Self {
        VersionSpec { ranges: Vec::new() }
    }

    pub(crate) fn from_ranges(ranges: Vec<VersionRange>) -> Self {
        let mut spec = VersionSpec { ranges };
        spec.canonicalize();
        spec
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    fn canonicalize(&mut self) {
        self.ranges.retain(|r| !r.is_empty());
        self.ranges.sort_by_key(|r| r.lower);
        let mut merged: Vec<VersionRange> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.touches(&r) {
                    *last = last.union_touching(&r);
                    continue;
                }
            }
            merged.push(r);
        }
        self.ranges = merged;
    }

    pub fn contains(&self, v: &Version) -> bool {
        self.ranges.iter().any(|r| r.contains(v))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn intersect(&self, other: &VersionSpec) -> VersionSpec {
        let mut out = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(r) = a.intersect(b) {
                    out.push(r);
                }
            }
        }
        VersionSpec::from_ranges(out)
    }

    pub fn union(&self, other: &VersionSpec) -> VersionSpec {
        let mut out = self.ranges.clone();
        out.extend(other.ranges.iter().copied());
        VersionSpec::from_ranges(out)
    }

}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return write!(f, "<0");
        }
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Parse the SemverSpec grammar of `spec.md` §3 into a canonical
/// [`VersionSpec`].
pub fn spec_from_string(s: &str) -> Result<VersionSpec> {
    let mut ranges = Vec::new();
    for raw_item in s.split(',') {
        let item = raw_item.trim();
        if item.is_empty() {
            return Err(bad_spec("compat spec", s));
        }
        ranges.push(parse_item(item)?);
    }
    Ok(VersionSpec::from_ranges(ranges))
}

fn parse_item(item: &str) -> Result<VersionRange> {
    if let Some(idx) = item.find(" - ") {
        let (lhs, rhs) = (item[..idx].trim(), item[idx + 3..].trim());
        let lower = parse_components(lhs)?;
        let upper = parse_components(rhs)?;
        return Ok(VersionRange::prefix(&lower, &upper));
    }
    if let Some(rest) = item.strip_prefix('^') {
        let c = parse_components(rest)?;
        if c.is_empty() {
            return Err(bad_spec("compat spec", item));
        }
        let sig_len = caret_significant_len(&c);
        return Ok(VersionRange::prefix(&c, &c[..sig_len]));
    }
    if let Some(rest) = item.strip_prefix('~') {
        let c = parse_components(rest)?;
        if c.is_empty() {
            return Err(bad_spec("compat spec", item));
        }
        let prefix_len = if c.len() <= 1 { 1 } else { 2 };
        return Ok(VersionRange::prefix(&c, &c[..prefix_len]));
    }
    if let Some(rest) = item.strip_prefix('=') {
        let c = parse_components(rest)?;
        if c.is_empty() {
            return Err(bad_spec("compat spec", item));
        }
        return Ok(VersionRange::prefix(&c, &c));
    }
    if let Some(rest) = item.strip_prefix(">=").or_else(|| item.strip_prefix('\u{2265}')) {
        let c = parse_components(rest)?;
        if c.is_empty() {
            return Err(bad_spec("compat spec", item));
        }
        return Ok(VersionRange::at_least(&c));
    }
    if let Some(rest) = item.strip_prefix('<') {
        let c = parse_components(rest)?;
        if c.is_empty() {
            return Err(bad_spec("compat spec", item));
        }
        return Ok(VersionRange::strictly_below(&c));
    }
    // bare `X[.Y[.Z]]` is equivalent to caret.
    let c = parse_components(item)?;
    if c.is_empty() {
        return Err(bad_spec("compat spec", item));
    }
    let sig_len = caret_significant_len(&c);
    Ok(VersionRange::prefix(&c, &c[..sig_len]))
}

/// The leftmost non-zero component's (1-based) position; if every given
/// component is zero, the anchor's own given length (`spec.md` §4.1 "the
/// significant digit is the leftmost non-zero in the anchor").
fn caret_significant_len(components: &[u64]) -> usize {
    for (i, c) in components.iter().enumerate() {
        if *c != 0 {
            return i + 1;
        }
    }
    components.len().max(1)
}

/// `spec_to_string(spec_from_string(s))` is idempotent (`spec.md` §4.1
/// invariant), though not necessarily byte-identical to `s`.
pub fn spec_to_string(spec: &VersionSpec) -> String {
    spec.to_string()
}

pub fn spec_intersect(a: &VersionSpec, b: &VersionSpec) -> VersionSpec {
    a.intersect(b)
}

pub fn spec_union(a: &VersionSpec, b: &VersionSpec) -> VersionSpec {
    a.union(b)
}

pub fn spec_contains(spec: &VersionSpec, v: &Version) -> bool {
    spec.contains(v)
}

pub fn range_contains(range: &VersionRange, v: &Version) -> bool {
    range.contains(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn caret_constrains_at_leftmost_nonzero() {
        let spec = spec_from_string("^1.2.3").unwrap();
        assert!(spec.contains(&v("1.2.3")));
        assert!(spec.contains(&v("1.9.0")));
        assert!(!spec.contains(&v("2.0.0")));
        assert!(!spec.contains(&v("1.2.2")));

        let spec = spec_from_string("^0.2.3").unwrap();
        assert!(spec.contains(&v("0.2.3")));
        assert!(spec.contains(&v("0.2.9")));
        assert!(!spec.contains(&v("0.3.0")));

        let spec = spec_from_string("^0.0.3").unwrap();
        assert!(spec.contains(&v("0.0.3")));
        assert!(!spec.contains(&v("0.0.4")));
    }

    #[test]
    fn tilde_on_bare_major_behaves_like_caret() {
        let tilde = spec_from_string("~1").unwrap();
        let caret = spec_from_string("^1").unwrap();
        assert_eq!(tilde, caret);
        assert!(tilde.contains(&v("1.9.9")));
        assert!(!tilde.contains(&v("2.0.0")));
    }

    #[test]
    fn tilde_with_minor_only_allows_patch_bumps() {
        let spec = spec_from_string("~1.2").unwrap();
        assert!(spec.contains(&v("1.2.0")));
        assert!(spec.contains(&v("1.2.99")));
        assert!(!spec.contains(&v("1.3.0")));
    }

    #[test]
    fn exact_and_at_least_and_strictly_below() {
        let exact = spec_from_string("=1.2.3").unwrap();
        assert!(exact.contains(&v("1.2.3")));
        assert!(!exact.contains(&v("1.2.4")));

        let at_least = spec_from_string("\u{2265}1.2").unwrap();
        assert!(at_least.contains(&v("99.0.0")));
        assert!(!at_least.contains(&v("1.1.9")));

        let below = spec_from_string("<2").unwrap();
        assert!(below.contains(&v("1.999.999")));
        assert!(!below.contains(&v("2.0.0")));
    }

    #[test]
    fn dash_range_is_inclusive_on_both_ends() {
        let spec = spec_from_string("1.2 - 1.4").unwrap();
        assert!(spec.contains(&v("1.2.0")));
        assert!(spec.contains(&v("1.4.99")));
        assert!(!spec.contains(&v("1.5.0")));
    }

    #[test]
    fn comma_separated_items_union() {
        let spec = spec_from_string("^1.0.0, ^3.0.0").unwrap();
        assert!(spec.contains(&v("1.5.0")));
        assert!(spec.contains(&v("3.2.0")));
        assert!(!spec.contains(&v("2.0.0")));
    }

    #[test]
    fn bare_version_is_equivalent_to_caret() {
        assert_eq!(spec_from_string("1.2.3").unwrap(), spec_from_string("^1.2.3").unwrap());
    }

    #[test]
    fn touching_ranges_merge_on_canonicalize() {
        let spec = spec_from_string("^1.0.0, ^2.0.0").unwrap();
        // ^1 covers [1,2), ^2 covers [2,3): adjacent, so they merge into one range.
        assert_eq!(spec.ranges().len(), 1);
    }

    #[test]
    fn invalid_grammar_is_rejected() {
        assert!(spec_from_string("not-a-version").is_err());
        assert!(spec_from_string("").is_err());
        assert!(spec_from_string("^1,").is_err());
    }

    proptest! {
        #[test]
        fn intersect_is_subset_of_both_operands(
            a_maj in 0u64..4, a_min in 0u64..4,
            b_maj in 0u64..4, b_min in 0u64..4,
            p_maj in 0u64..6, p_min in 0u64..6, p_pat in 0u64..6,
        ) {
            let a = spec_from_string(&format!("^{a_maj}.{a_min}.0")).unwrap();
            let b = spec_from_string(&format!("^{b_maj}.{b_min}.0")).unwrap();
            let inter = a.intersect(&b);
            let probe = Version::new(p_maj, p_min, p_pat);
            if inter.contains(&probe) {
                prop_assert!(a.contains(&probe));
                prop_assert!(b.contains(&probe));
            }
        }

        #[test]
        fn round_trip_through_display_is_idempotent(
            maj in 0u64..10, min in 0u64..10, pat in 0u64..10,
        ) {
            let spec = spec_from_string(&format!("^{maj}.{min}.{pat}")).unwrap();
            let printed = spec_to_string(&spec);
            let reparsed = spec_from_string(&printed).unwrap();
            prop_assert_eq!(spec_to_string(&reparsed), printed);
        }
    }
}
