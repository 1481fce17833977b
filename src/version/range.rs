use std::fmt;

use super::{
    bump_prefix, floor_triple, format_components, trim_components, unbump_prefix, Version,
};

/// A contiguous span of versions, stored internally as a half-open interval
/// `[lower, upper)` (`upper = None` means +∞). `spec.md` §3 describes the
/// same range via inclusive padded bounds; every grammar construct in §3/
/// §4.1 (caret, tilde, exact, open, strictly-below, dash) reduces to this
/// single representation, which is what makes canonicalization, merging,
/// intersection, and union uniform (see DESIGN.md for the reconciliation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub(crate) lower: (u64, u64, u64),
    pub(crate) upper: Option<(u64, u64, u64)>,
}

impl VersionRange {
    /// An inclusive-prefix range: `lower` floor-padded, `upper_prefix`
    /// infinity-padded (anything extending the given prefix is included).
    /// Used by caret, tilde, exact-prefix, and the `Y` side of `X - Y`.
    pub(crate) fn prefix(lower: &[u64], upper_prefix: &[u64]) -> Self {
        VersionRange {
            lower: floor_triple(lower),
            upper: if upper_prefix.is_empty() {
                None
            } else {
                Some(bump_prefix(upper_prefix))
            },
        }
    }

    /// A strictly-below range: `v < floor_triple(upper)` (the `<X` token).
    pub(crate) fn strictly_below(upper: &[u64]) -> Self {
        VersionRange {
            lower: (0, 0, 0),
            upper: Some(floor_triple(upper)),
        }
    }

    /// An open-above range: `v >= floor_triple(lower)` (the `≥X` token).
    pub(crate) fn at_least(lower: &[u64]) -> Self {
        VersionRange {
            lower: floor_triple(lower),
            upper: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.upper {
            Some(u) => u <= self.lower,
            None => false,
        }
    }

    pub fn contains(&self, v: &Version) -> bool {
        let t = v.as_triple();
        t >= self.lower
            && match self.upper {
                Some(u) => t < u,
                None => true,
            }
    }

    /// `true` if `self` and `other` overlap or touch (so they can be merged
    /// into one contiguous range without changing the set of included
    /// versions).
    pub(crate) fn touches(&self, other: &VersionRange) -> bool {
        let (a, b) = if self.lower <= other.lower {
            (self, other)
        } else {
            (other, self)
        };
        match a.upper {
            None => true,
            Some(u) => u >= b.lower,
        }
    }

    pub(crate) fn union_touching(&self, other: &VersionRange) -> VersionRange {
        let lower = self.lower.min(other.lower);
        let upper = match (self.upper, other.upper) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => Some(a.max(b)),
        };
        VersionRange { lower, upper }
    }

    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let lower = self.lower.max(other.lower);
        let upper = match (self.upper, other.upper) {
            (None, None) => None,
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        let r = VersionRange { lower, upper };
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            None => write!(f, "\u{2265}{}", format_components(&trim_components(self.lower))),
            Some(u) if self.lower == (0, 0, 0) => {
                write!(f, "<{}", format_components(&trim_components(u)))
            }
            Some(u) => write!(
                f,
                "{} - {}",
                format_components(&trim_components(self.lower)),
                format_components(&unbump_prefix(u))
            ),
        }
    }
}
