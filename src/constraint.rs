//! Version selection from lock file constraints.

use std::sync::LazyLock;

use regex::Regex;

use crate::semver::{Version, satisfies_constraint};

/// First `major.minor.patch[-prerelease]` literal embedded anywhere in a clause.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static EMBEDDED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?").expect("valid regex");
});

/// How to pick a version when a lock entry carries constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Trust the lock file's own resolution.
    #[default]
    High,
    /// Oldest version named by the constraints.
    Low,
    /// Upper-middle version named by the constraints.
    Middle,
    /// Any other configured name. Behaves like the locked version.
    Unrecognized(String),
}

impl From<&str> for Strategy {
    fn from(name: &str) -> Self {
        return match name.trim() {
            "high" => Strategy::High,
            "low" => Strategy::Low,
            "middle" => Strategy::Middle,
            other => Strategy::Unrecognized(other.to_string()),
        };
    }
}

impl From<String> for Strategy {
    fn from(name: String) -> Self {
        return Strategy::from(name.as_str());
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            Strategy::High => f.write_str("high"),
            Strategy::Low => f.write_str("low"),
            Strategy::Middle => f.write_str("middle"),
            Strategy::Unrecognized(name) => f.write_str(name),
        };
    }
}

/// Extract the version literals from a comma-separated constraint expression.
///
/// Operators are discarded. Clauses without a version contribute nothing.
/// Duplicates are removed, keeping first-seen order.
pub fn parse_constraint_expression(constraints: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    for clause in constraints.split(',').map(str::trim) {
        let Some(found) = EMBEDDED_VERSION.find(clause) else {
            continue;
        };
        let literal = found.as_str();
        if !versions.iter().any(|v| return v == literal) {
            versions.push(literal.to_string());
        }
    }
    return versions;
}

/// Pick the version to embed in a documentation URL.
///
/// Absent or empty constraints, and the `high` strategy, return `locked`
/// unchanged. Otherwise the constraint literals are ranked newest first and
/// `low` takes the last one, `middle` the one at index `count / 2`. Every
/// degenerate case (nothing extracted, nothing parses, unknown strategy)
/// falls back to `locked`.
pub fn resolve_version(locked: &str, constraints: Option<&str>, strategy: &Strategy) -> String {
    let Some(constraints) = constraints.filter(|c| return !c.trim().is_empty()) else {
        return locked.to_string();
    };
    if *strategy == Strategy::High {
        return locked.to_string();
    }

    let extracted = parse_constraint_expression(constraints);
    if let [only] = extracted.as_slice() {
        return only.clone();
    }

    let mut parsed: Vec<Version> = extracted.iter().filter_map(|v| return Version::parse(v)).collect();
    if parsed.is_empty() {
        tracing::debug!(constraints, "no usable versions in constraints, keeping locked version");
        return locked.to_string();
    }
    parsed.sort_by(|a, b| return b.cmp(a));

    let picked = match strategy {
        Strategy::Low => parsed.last(),
        Strategy::Middle => parsed.get(parsed.len() / 2),
        Strategy::High | Strategy::Unrecognized(_) => None,
    };
    return picked.map_or_else(|| return locked.to_string(), ToString::to_string);
}

/// Whether `locked` passes every clause that names a full version.
/// Clauses like `~> 5.0` carry no full version and are not checked.
pub fn locked_satisfies(locked: &str, constraints: &str) -> bool {
    return constraints
        .split(',')
        .map(str::trim)
        .filter(|clause| return EMBEDDED_VERSION.is_match(clause))
        .all(|clause| return satisfies_constraint(locked, clause));
}
