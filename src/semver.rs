//! Semantic version model with the simplified precedence used for registry lookups.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

/// Whole-string `major.minor.patch[-prerelease]`.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z.\-]+))?$").expect("valid regex");
});

/// A parsed version.
///
/// Ordering compares major, minor, then patch numerically. When all three are
/// equal a release sorts after any prerelease, and two prereleases compare by
/// plain string order of their tags. This is intentionally simpler than full
/// semver precedence (no dot-separated identifier comparison).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Tag after `-`, kept verbatim.
    pub prerelease: Option<String>,
}

impl Version {
    /// Parse `major.minor.patch[-prerelease]`. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = VERSION_PATTERN.captures(text.trim())?;
        return Some(Self {
            major: caps.get(1)?.as_str().parse().ok()?,
            minor: caps.get(2)?.as_str().parse().ok()?,
            patch: caps.get(3)?.as_str().parse().ok()?,
            prerelease: caps.get(4).map(|m| return m.as_str().to_string()),
        });
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let numeric = (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch));
        if numeric != Ordering::Equal {
            return numeric;
        }
        return match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        };
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        return Ok(());
    }
}

/// Comparison operators accepted in a single constraint clause.
/// Longer operators come first so `>=` is not read as `>`.
const OPERATORS: [&str; 6] = ["~>", ">=", "<=", ">", "<", "="];

/// Check `version` against one clause such as `>= 1.2.0` or `~> 4.5.0`.
///
/// `~>` means at least the given version with the same major and minor.
/// Anything unrecognized, including operands that don't parse, falls back to
/// exact string equality of the trimmed inputs.
pub fn satisfies_constraint(version: &str, clause: &str) -> bool {
    let clause = clause.trim();
    let (operator, operand) = split_operator(clause);

    let (Some(candidate), Some(bound)) = (Version::parse(version), Version::parse(operand)) else {
        return version.trim() == clause;
    };

    return match operator {
        "" | "=" => candidate == bound,
        ">=" => candidate >= bound,
        ">" => candidate > bound,
        "<=" => candidate <= bound,
        "<" => candidate < bound,
        "~>" => candidate >= bound && candidate.major == bound.major && candidate.minor == bound.minor,
        _ => version.trim() == clause,
    };
}

/// Split a clause into its leading operator (possibly empty) and trimmed operand.
fn split_operator(clause: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = clause.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    return ("", clause);
}
