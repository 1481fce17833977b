//! Version algebra: versions, bounds, ranges, and version sets
//! (`spec.md` §3, §4.1).
//!
//! Pre-release and build metadata are parsed and then discarded: this
//! system orders and compresses purely on the `(major, minor, patch)`
//! triple (`spec.md` §3 Version, §4.2 compress_versions).

mod bound;
mod compress;
mod range;
mod spec;

pub use bound::VersionBound;
pub use compress::{compress_versions, load_compressed, to_compressed};
pub use range::VersionRange;
pub use spec::VersionSpec;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    pub(crate) fn as_triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    pub(crate) fn from_triple(t: (u64, u64, u64)) -> Self {
        Version {
            major: t.0,
            minor: t.1,
            patch: t.2,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_version(s)
    }
}

/// Parse a full `major.minor.patch[-pre][+build]` version, dropping any
/// pre-release/build suffix (`spec.md` §3 Version).
pub fn parse_version(s: &str) -> Result<Version> {
    let core = strip_suffix(s);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(bad_spec("version", s));
    }
    let mut nums = [0u64; 3];
    for (i, p) in parts.iter().enumerate() {
        nums[i] = p.parse::<u64>().map_err(|_| bad_spec("version", s))?;
    }
    Ok(Version::new(nums[0], nums[1], nums[2]))
}

/// Drop a `-pre` and/or `+build` suffix, keeping only the numeric core.
fn strip_suffix(s: &str) -> &str {
    let s = match s.find('+') {
        Some(i) => &s[..i],
        None => s,
    };
    match s.find('-') {
        Some(i) => &s[..i],
        None => s,
    }
}

/// Parse the raw numeric components of an anchor like `1`, `1.2`, or
/// `1.2.3`, without the `^`/`~`/`=`/`<`/`≥` prefix. Used by both
/// `parse_bound` (§4.1) and the grammar-token parsers in `spec.rs`.
pub(crate) fn parse_components(s: &str) -> Result<Vec<u64>> {
    let core = strip_suffix(s.trim());
    if core.is_empty() {
        return Err(bad_spec("version component", s));
    }
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(bad_spec("version component", s));
    }
    parts
        .iter()
        .map(|p| p.parse::<u64>().map_err(|_| bad_spec("version component", s)))
        .collect()
}

pub(crate) fn bad_spec(kind: &'static str, text: &str) -> Error {
    Error::BadSpec {
        kind,
        text: text.to_string(),
    }
}

/// Pad `components` (length 0..=3) to a full triple, filling missing
/// trailing slots with zero (the "floor" padding of `spec.md` §3/§4.1).
pub(crate) fn floor_triple(components: &[u64]) -> (u64, u64, u64) {
    let mut t = [0u64; 3];
    for (i, c) in components.iter().enumerate() {
        t[i] = *c;
    }
    (t[0], t[1], t[2])
}

/// Given the components of a prefix bound, compute the exclusive upper
/// boundary one step past the last explicit component: `bump_prefix([1,2])
/// == (1,3,0)`, i.e. "anything starting with 1.2" becomes "everything below
/// 1.3.0". This is how every inclusive-prefix upper bound in the grammar
/// (caret, tilde, exact, the Y side of `X - Y`) is represented internally
/// as a half-open interval.
pub(crate) fn bump_prefix(components: &[u64]) -> (u64, u64, u64) {
    let mut t = floor_triple(components);
    match components.len() {
        0 => return (0, 0, 0), // never actually used as an upper bound
        1 => t.0 += 1,
        2 => t.1 += 1,
        _ => t.2 += 1,
    }
    t
}

/// Invert [`bump_prefix`]: given an exclusive upper triple, find the
/// shortest prefix `Y` (as given-length components) such that
/// `bump_prefix(Y) == upper`. Used only for canonical (non-minimal)
/// textual printing; `compress_versions` prints its own accepted widths
/// directly and never calls this.
pub(crate) fn unbump_prefix(upper: (u64, u64, u64)) -> Vec<u64> {
    if upper.2 > 0 {
        vec![upper.0, upper.1, upper.2 - 1]
    } else if upper.1 > 0 {
        vec![upper.0, upper.1 - 1]
    } else {
        vec![upper.0.saturating_sub(1)]
    }
}

/// Trim trailing zero components for display, but always keep at least one
/// component.
pub(crate) fn trim_components(t: (u64, u64, u64)) -> Vec<u64> {
    if t.2 != 0 {
        vec![t.0, t.1, t.2]
    } else if t.1 != 0 {
        vec![t.0, t.1]
    } else {
        vec![t.0]
    }
}

pub(crate) fn format_components(c: &[u64]) -> String {
    c.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
