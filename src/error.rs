/// Crate-level error types for tfdoc diagnostics.
use std::path::PathBuf;

/// Errors raised by the outer surfaces: files, config, positions, and the init tool.
/// Lookups that simply find nothing are `None`, never an `Error`.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The HTTP client for registry lookups could not be built.
    #[error("http client: {0}")]
    HttpClient(
        /// The wrapped client construction error.
        #[from]
        reqwest::Error,
    ),

    /// The configured init command has no program name.
    #[error("init command is empty")]
    InitCommandEmpty,

    /// The init tool ran but did not succeed.
    #[error("`{command}` failed{}", code.map(|c| return format!(" with exit code {c}")).unwrap_or_default())]
    InitFailed {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// The command line that was run.
        command: String,
    },

    /// The init tool could not be started.
    #[error("could not start `{command}`: {source}")]
    InitSpawn {
        /// The command line that was attempted.
        command: String,
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// A line/column pair from the command line lies outside the document.
    #[error("position {line}:{column} is outside {} ({line_count} lines)", file.display())]
    InvalidPosition {
        /// One-based column as given.
        column: usize,
        /// Document the position was meant for.
        file: PathBuf,
        /// One-based line as given.
        line: usize,
        /// Number of lines in the document.
        line_count: usize,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// No lock file was found at or above the given directory.
    #[error("lockfile not found: {}", path.display())]
    LockfileNotFound {
        /// Directory the search started from.
        path: PathBuf,
    },

    /// The directory contains no configuration files.
    #[error("no .tf files in {}", path.display())]
    NotAConfiguration {
        /// Directory that was inspected.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}
