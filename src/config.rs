use std::path::Path;
use std::time::Duration;

use crate::constraint::Strategy;
use crate::error::Error;

/// Public registry used when `.tfdoc.toml` does not name one.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.terraform.io";

/// Project configuration loaded from `.tfdoc.toml`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Argv of the initialization tool.
    pub init_command: Vec<String>,
    /// Substitute `latest` when the resolved version is the newest published one.
    pub latest: bool,
    /// Name of the provider lock file.
    pub lockfile: String,
    /// Upper bound on a single latest-version lookup.
    pub lookup_timeout: Duration,
    /// Base URL of the public registry, without a trailing slash.
    pub registry_url: String,
    /// How to pick a version from lock file constraints.
    pub strategy: Strategy,
}

/// Raw TOML structure for `.tfdoc.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TfdocTomlConfig {
    /// Argv of the initialization tool.
    init_command: Option<Vec<String>>,
    /// Whether to substitute `latest`.
    latest: Option<bool>,
    /// Lock file name.
    lockfile: Option<String>,
    /// Lookup timeout in milliseconds.
    lookup_timeout_ms: Option<u64>,
    /// Registry base URL.
    registry_url: Option<String>,
    /// Strategy name. Unknown names are kept and behave like the locked version.
    strategy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            init_command: vec!["terraform".to_string(), "init".to_string()],
            latest: true,
            lockfile: ".terraform.lock.hcl".to_string(),
            lookup_timeout: Duration::from_millis(3000),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            strategy: Strategy::default(),
        };
    }
}

impl Config {
    /// Load config from `.tfdoc.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist. A file that exists but is
    /// malformed is an error, never silently replaced with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".tfdoc.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: TfdocTomlConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        return Ok(Self::from_raw(raw));
    }

    /// Overlay the values present in a parsed file onto the defaults.
    fn from_raw(raw: TfdocTomlConfig) -> Self {
        let defaults = Self::default();
        return Self {
            init_command: raw.init_command.unwrap_or(defaults.init_command),
            latest: raw.latest.unwrap_or(defaults.latest),
            lockfile: raw.lockfile.unwrap_or(defaults.lockfile),
            lookup_timeout: raw
                .lookup_timeout_ms
                .map_or(defaults.lookup_timeout, Duration::from_millis),
            registry_url: raw
                .registry_url
                .map_or(defaults.registry_url, |u| return u.trim_end_matches('/').to_string()),
            strategy: raw.strategy.map_or(defaults.strategy, Strategy::from),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.strategy, Strategy::High);
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert!(config.latest);
        assert_eq!(config.init_command, ["terraform", "init"]);
    }

    #[test]
    fn values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".tfdoc.toml"),
            "strategy = \"middle\"\nregistry_url = \"https://mirror.example.com/\"\nlatest = false\nlookup_timeout_ms = 250\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.strategy, Strategy::Middle);
        assert_eq!(config.registry_url, "https://mirror.example.com");
        assert!(!config.latest);
        assert_eq!(config.lookup_timeout, Duration::from_millis(250));
        assert_eq!(config.lockfile, ".terraform.lock.hcl");
    }

    #[test]
    fn unknown_strategy_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".tfdoc.toml"), "strategy = \"newest\"\n").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.strategy, Strategy::Unrecognized("newest".to_string()));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".tfdoc.toml"), "strategy = [").unwrap();

        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }
}
