//! Provider lock file parsing: `provider "<source>" { ... }` blocks from `.terraform.lock.hcl`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// `provider "registry.terraform.io/hashicorp/aws" {`
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static PROVIDER_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"(?m)^\s*provider\s+"([^"]+)"\s*\{"#).expect("valid regex");
});

/// `key = "value"` on its own line inside a provider body.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static STRING_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"(?m)^\s*([a-z_]+)\s*=\s*"([^"]*)""#).expect("valid regex");
});

/// `key = [ ... ]`, possibly spanning lines.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static LIST_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"(?m)^\s*([a-z_]+)\s*=\s*\[([^\]]*)\]").expect("valid regex");
});

/// Any double-quoted string.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#""([^"]*)""#).expect("valid regex");
});

/// Provider identity with the registry host stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderSource {
    /// Provider type name, e.g. `aws`.
    pub name: String,
    /// Publishing namespace, e.g. `hashicorp`.
    pub namespace: String,
}

impl ProviderSource {
    /// Normalize `host/namespace/name` or `namespace/name`. A bare `name`
    /// gets the `hashicorp` namespace, as the registry does for legacy sources.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<&str> = raw.trim().split('/').collect();
        let (namespace, name) = match segments.as_slice() {
            [_, namespace, name] | [namespace, name] => (*namespace, *name),
            [name] => ("hashicorp", *name),
            _ => return None,
        };
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        return Some(Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
    }
}

impl std::fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{}/{}", self.namespace, self.name);
    }
}

/// One locked provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLock {
    /// Raw constraint expression, if the lock recorded one.
    pub constraints: Option<String>,
    /// Package checksums. Not interpreted.
    pub hashes: Vec<String>,
    /// Platform list. Not interpreted.
    pub platforms: Vec<String>,
    /// Normalized provider identity.
    pub source: ProviderSource,
    /// Exact locked version.
    pub version: Option<String>,
}

/// All provider locks in file order.
#[derive(Debug, Clone, Default)]
pub struct Lockfile {
    /// Parsed provider blocks.
    pub providers: Vec<ProviderLock>,
}

impl Lockfile {
    /// Parse lock file text. Comments are stripped first; blocks whose source
    /// can't be normalized or whose braces never close are skipped.
    pub fn parse(content: &str) -> Self {
        let stripped = strip_comments(content);
        let mut providers = Vec::new();

        for caps in PROVIDER_HEADER.captures_iter(&stripped) {
            let (Some(header), Some(raw_source)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(source) = ProviderSource::parse(raw_source.as_str()) else {
                tracing::debug!(source = raw_source.as_str(), "skipping provider with unrecognized source");
                continue;
            };
            let Some(body) = stripped.get(header.end()..).and_then(block_body) else {
                tracing::debug!(%source, "skipping unterminated provider block");
                continue;
            };
            providers.push(parse_provider_body(source, body));
        }

        return Self { providers };
    }

    /// Read and parse a lock file from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file doesn't exist,
    /// or `Error::Io` for other read failures.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Ok(Self::parse(&content));
    }

    /// Find `file_name` in `start` or the nearest parent directory that has it.
    pub fn locate(start: &Path, file_name: &str) -> Option<PathBuf> {
        return start
            .ancestors()
            .map(|dir| return dir.join(file_name))
            .find(|candidate| return candidate.is_file());
    }

    /// Locate and read the nearest lock file. `Ok(None)` when there is none.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a lock file exists but cannot be read.
    pub fn discover(start: &Path, file_name: &str) -> Result<Option<Self>, Error> {
        let Some(path) = Self::locate(start, file_name) else {
            tracing::debug!(start = %start.display(), file_name, "no lock file found");
            return Ok(None);
        };
        tracing::debug!(path = %path.display(), "using lock file");
        return Self::read(&path).map(Some);
    }

    /// The lock entry for a provider short name such as `aws`.
    pub fn provider_named(&self, name: &str) -> Option<&ProviderLock> {
        return self.providers.iter().find(|p| return p.source.name == name);
    }
}

/// Read the attributes of one provider body.
fn parse_provider_body(source: ProviderSource, body: &str) -> ProviderLock {
    let mut lock = ProviderLock {
        constraints: None,
        hashes: Vec::new(),
        platforms: Vec::new(),
        source,
        version: None,
    };
    let body = top_level_text(body);

    for caps in STRING_ATTRIBUTE.captures_iter(&body) {
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        match key.as_str() {
            "constraints" => lock.constraints = Some(value.as_str().to_string()),
            "version" => lock.version = Some(value.as_str().to_string()),
            _ => {},
        }
    }

    for caps in LIST_ATTRIBUTE.captures_iter(&body) {
        let (Some(key), Some(items)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let values: Vec<String> = QUOTED
            .captures_iter(items.as_str())
            .filter_map(|c| return c.get(1).map(|m| return m.as_str().to_string()))
            .collect();
        match key.as_str() {
            "hashes" => lock.hashes = values,
            "platforms" => lock.platforms = values,
            _ => {},
        }
    }

    return lock;
}

/// Text of a block body, given the text right after its opening `{`.
/// Nested braces are balanced; braces inside strings are ignored.
fn block_body(after_open: &str) -> Option<&str> {
    let mut depth = 1_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (byte, ch) in after_open.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {},
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth = depth.saturating_add(1),
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return after_open.get(..byte);
                }
            },
            _ => {},
        }
    }
    return None;
}

/// Text of a block body with nested blocks removed, keeping line breaks.
/// Braces inside strings do not change the depth.
fn top_level_text(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for ch in body.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {},
            }
        } else {
            match ch {
                '"' => in_string = true,
                '{' => {
                    depth = depth.saturating_add(1);
                    continue;
                },
                '}' => {
                    depth = depth.saturating_sub(1);
                    continue;
                },
                _ => {},
            }
        }
        if depth == 0 || ch == '\n' {
            out.push(ch);
        }
    }
    return out;
}

/// Remove `#` and `//` comments that start outside a string, up to end of line.
fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        out.push_str(strip_line_comment(line));
        out.push('\n');
    }
    return out;
}

/// The part of one line before any comment.
fn strip_line_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let mut previous_slash = false;

    for (byte, ch) in line.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {},
            }
            previous_slash = false;
            continue;
        }
        match ch {
            '"' => in_string = true,
            '#' => return line.get(..byte).unwrap_or(line),
            '/' if previous_slash => return line.get(..byte.saturating_sub(1)).unwrap_or(line),
            _ => {},
        }
        previous_slash = ch == '/';
    }
    return line;
}
