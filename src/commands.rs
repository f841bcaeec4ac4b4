//! CLI commands for tfdoc: lookup, links, versions, status, init.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;

use crate::config::Config;
use crate::constraint::{Strategy, locked_satisfies, resolve_version};
use crate::error;
use crate::lockfile::Lockfile;
use crate::project::{self, ProjectState, UninitializedReason};
use crate::registry::{LatestVersionCache, RegistryClient};
use crate::target::{self, LatestLookup, LookupContext};
use crate::types::{Document, Position};

/// Settings given on the command line that take precedence over `.tfdoc.toml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Never query the registry for latest versions.
    pub offline: bool,
    /// Strategy name replacing the configured one.
    pub strategy: Option<String>,
}

/// Config, lock file, and latest-version lookup shared by one command run.
struct Session {
    /// Successful latest-version lookups for this run.
    cache: LatestVersionCache,
    /// Effective configuration after overrides.
    config: Config,
    /// Nearest lock file, if there is one.
    lockfile: Option<Lockfile>,
    /// Registry client, when latest substitution is enabled.
    registry: Option<RegistryClient>,
}

impl Session {
    /// Load config from the working directory and the lock file nearest `lock_search_start`.
    ///
    /// # Errors
    ///
    /// Returns errors from config loading or lock file reading.
    fn open(lock_search_start: &Path, overrides: &Overrides) -> Result<Self, error::Error> {
        let mut config = Config::load(Path::new("."))?;
        if let Some(name) = &overrides.strategy {
            config.strategy = Strategy::from(name.as_str());
        }

        let lockfile = Lockfile::discover(lock_search_start, &config.lockfile)?;

        let registry = if config.latest && !overrides.offline {
            match RegistryClient::new(&config.registry_url, config.lookup_timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "registry client unavailable, showing exact versions");
                    None
                },
            }
        } else {
            None
        };

        return Ok(Self {
            cache: LatestVersionCache::new(),
            config,
            lockfile,
            registry,
        });
    }

    /// Borrow the session as a lookup context.
    fn context(&self) -> LookupContext<'_> {
        return LookupContext {
            latest: self.registry.as_ref().map(|client| {
                return LatestLookup {
                    cache: &self.cache,
                    source: client,
                };
            }),
            lockfile: self.lockfile.as_ref(),
            registry_url: &self.config.registry_url,
            strategy: &self.config.strategy,
        };
    }
}

/// One row of `tfdoc versions`.
#[derive(Serialize)]
struct VersionRow {
    /// Raw constraint expression.
    constraints: Option<String>,
    /// Number of recorded package hashes.
    hash_count: usize,
    /// Whether `resolved` is the newest published version, when known.
    latest: Option<bool>,
    /// Exact locked version.
    locked: Option<String>,
    /// Whether the locked version passes its own constraints.
    locked_satisfies: Option<bool>,
    /// Platforms recorded for the provider.
    platforms: Vec<String>,
    /// Version that documentation links use.
    resolved: Option<String>,
    /// Normalized provider identity.
    source: String,
}

/// Directory whose configuration a file belongs to.
fn directory_of(file: &Path) -> PathBuf {
    return match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
}

/// Run the init tool in the working directory, streaming its output.
///
/// # Errors
///
/// Returns `Error::NotAConfiguration` outside a configuration directory, or
/// errors from config loading or the init tool.
pub fn init() -> Result<ExitCode, error::Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;

    if ProjectState::detect(&root, &config.lockfile)? == ProjectState::NotAConfiguration {
        return Err(error::Error::NotAConfiguration { path: root });
    }

    eprintln!("Running `{}`", config.init_command.join(" "));
    project::run_init(&root, &config.init_command, |line| println!("{line}"))?;
    eprintln!("Initialized. Documentation lookups now use locked provider versions.");
    return Ok(ExitCode::SUCCESS);
}

/// List every declaration in a file with its documentation target.
///
/// # Errors
///
/// Returns errors from reading the file, config, or lock file, or JSON output.
pub fn links(file: &Path, json: bool, overrides: &Overrides) -> Result<ExitCode, error::Error> {
    let document = Document::read(file)?;
    let session = Session::open(&directory_of(file), overrides)?;
    let links = target::document_links(&document, file, &session.context());

    if json {
        println!("{}", serde_json::to_string_pretty(&links)?);
    } else {
        for link in &links {
            println!("{}:{}\t{}\t{}", file.display(), link.line, link.address, link.target);
        }
    }
    return Ok(ExitCode::SUCCESS);
}

/// Resolve the construct at a one-based line and column to a documentation
/// target. Exits 1 when nothing is recognized there.
///
/// # Errors
///
/// Returns `Error::InvalidPosition` for a position outside the file, or errors
/// from reading the file, config, or lock file.
pub fn lookup(file: &Path, line: usize, column: usize, json: bool, overrides: &Overrides) -> Result<ExitCode, error::Error> {
    let document = Document::read(file)?;
    let position = zero_based_position(&document, file, line, column)?;
    let session = Session::open(&directory_of(file), overrides)?;

    let Some(found) = target::resolve_target(&document, file, position, &session.context()) else {
        eprintln!("No documentation target at {}:{line}:{column}", file.display());
        return Ok(ExitCode::from(1));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        println!("{found}");
    }
    return Ok(ExitCode::SUCCESS);
}

/// Report whether the working directory needs initializing. Exits 1 if it does.
///
/// # Errors
///
/// Returns `Error::NotAConfiguration` outside a configuration directory, or
/// errors from config loading or reading configuration files.
pub fn status() -> Result<ExitCode, error::Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;

    let reason = match ProjectState::detect(&root, &config.lockfile)? {
        ProjectState::Initialized => {
            println!("Initialized");
            return Ok(ExitCode::SUCCESS);
        },
        ProjectState::NotAConfiguration => {
            return Err(error::Error::NotAConfiguration { path: root });
        },
        ProjectState::Uninitialized(UninitializedReason::MissingLockfile) => "no provider lock file",
        ProjectState::Uninitialized(UninitializedReason::MissingWorkingDirectory) => "no .terraform directory",
    };

    println!("Uninitialized ({reason})");
    eprintln!();
    eprintln!("hint: documentation links fall back to latest versions until the project is initialized:");
    eprintln!("  tfdoc init");
    return Ok(ExitCode::from(1));
}

/// List locked providers with the version documentation links will use.
///
/// # Errors
///
/// Returns `Error::LockfileNotFound` if there is no lock file, or errors from
/// config loading or JSON output.
pub fn versions(json: bool, overrides: &Overrides) -> Result<ExitCode, error::Error> {
    let root = PathBuf::from(".");
    let session = Session::open(&root, overrides)?;
    let Some(lockfile) = &session.lockfile else {
        return Err(error::Error::LockfileNotFound { path: root });
    };
    let ctx = session.context();

    let rows: Vec<VersionRow> = lockfile
        .providers
        .iter()
        .map(|provider| {
            let resolved = provider
                .version
                .as_deref()
                .map(|locked| return resolve_version(locked, provider.constraints.as_deref(), ctx.strategy));
            let latest = ctx.latest.zip(resolved.as_deref()).map(|(lookup, version)| {
                return lookup.cache.is_latest_known(&provider.source, version, lookup.source);
            });
            let satisfies = provider
                .version
                .as_deref()
                .zip(provider.constraints.as_deref())
                .map(|(locked, constraints)| return locked_satisfies(locked, constraints));
            return VersionRow {
                constraints: provider.constraints.clone(),
                hash_count: provider.hashes.len(),
                latest,
                locked: provider.version.clone(),
                locked_satisfies: satisfies,
                platforms: provider.platforms.clone(),
                resolved,
                source: provider.source.to_string(),
            };
        })
        .collect();
    tracing::debug!(cached = session.cache.len(), "latest versions cached");

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(ExitCode::SUCCESS);
    }

    for row in &rows {
        let constraints = row.constraints.as_deref().map(|c| return format!("  ({c})")).unwrap_or_default();
        let marker = if row.latest == Some(true) { "  [latest]" } else { "" };
        let violation = if row.locked_satisfies == Some(false) { "  [outside constraints]" } else { "" };
        println!(
            "{}  {}{constraints}{violation}  -> {}{marker}",
            row.source,
            row.locked.as_deref().unwrap_or("-"),
            row.resolved.as_deref().unwrap_or("latest"),
        );
    }
    return Ok(ExitCode::SUCCESS);
}

/// Convert a one-based CLI position, checking it against the document.
///
/// # Errors
///
/// Returns `Error::InvalidPosition` if the line is outside the document or
/// either coordinate is zero.
fn zero_based_position(document: &Document, file: &Path, line: usize, column: usize) -> Result<Position, error::Error> {
    let invalid = || {
        return error::Error::InvalidPosition {
            column,
            file: file.to_path_buf(),
            line,
            line_count: document.line_count(),
        };
    };
    let line_index = line.checked_sub(1).filter(|l| return *l < document.line_count()).ok_or_else(invalid)?;
    let character = column.checked_sub(1).ok_or_else(invalid)?;
    return Ok(Position::new(line_index, character));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_based_position_converts() {
        let doc = Document::from_text("a\nbb\n");
        let pos = zero_based_position(&doc, Path::new("x.tf"), 2, 1).unwrap();
        assert_eq!(pos, Position::new(1, 0));
    }

    #[test]
    fn position_outside_document_is_rejected() {
        let doc = Document::from_text("a\n");
        for (line, column) in [(0, 1), (2, 1), (1, 0)] {
            let result = zero_based_position(&doc, Path::new("x.tf"), line, column);
            assert!(matches!(result, Err(error::Error::InvalidPosition { .. })), "{line}:{column}");
        }
    }

    #[test]
    fn file_in_working_directory_uses_dot() {
        assert_eq!(directory_of(Path::new("main.tf")), PathBuf::from("."));
        assert_eq!(directory_of(Path::new("envs/prod/main.tf")), PathBuf::from("envs/prod"));
    }
}
