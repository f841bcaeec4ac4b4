//! Project state detection and the external init tool.

use std::io::{BufRead as _, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use walkdir::WalkDir;

use crate::context::match_declaration;
use crate::error::Error;
use crate::types::Declaration;

/// Working directory the init tool creates.
const WORKING_DIRECTORY: &str = ".terraform";

/// Why a configuration directory needs initializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninitializedReason {
    /// Resources are declared but no provider lock file exists.
    MissingLockfile,
    /// The working directory has never been created.
    MissingWorkingDirectory,
}

/// Whether a directory is ready for documentation lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    /// Working directory and lock file are in place.
    Initialized,
    /// No `.tf` files at the top level of the directory.
    NotAConfiguration,
    /// Needs the init tool run before lookups are accurate.
    Uninitialized(UninitializedReason),
}

impl ProjectState {
    /// Inspect the top-level `.tf` files of `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a configuration file cannot be read.
    pub fn detect(root: &Path, lockfile_name: &str) -> Result<Self, Error> {
        let mut found_config = false;
        let mut declares_resources = false;

        for entry in WalkDir::new(root)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| return e.file_type().is_file() && e.path().extension().is_some_and(|ext| return ext == "tf"))
        {
            found_config = true;
            let content = std::fs::read_to_string(entry.path())?;
            declares_resources |= content
                .lines()
                .any(|line| return matches!(match_declaration(line), Some(Declaration::Resource(_))));
        }

        if !found_config {
            return Ok(ProjectState::NotAConfiguration);
        }
        if !root.join(WORKING_DIRECTORY).is_dir() {
            return Ok(ProjectState::Uninitialized(UninitializedReason::MissingWorkingDirectory));
        }
        if declares_resources && !root.join(lockfile_name).is_file() {
            return Ok(ProjectState::Uninitialized(UninitializedReason::MissingLockfile));
        }
        return Ok(ProjectState::Initialized);
    }
}

/// Run the init tool in `root`, passing each line of its stdout to `on_line`
/// as it is produced. Stderr goes straight to the terminal.
///
/// # Errors
///
/// Returns `Error::InitCommandEmpty` for an empty argv, `Error::InitSpawn` if
/// the program can't be started, `Error::Io` if reading its output fails, or
/// `Error::InitFailed` if it exits unsuccessfully.
pub fn run_init(root: &Path, argv: &[String], mut on_line: impl FnMut(&str)) -> Result<(), Error> {
    let (program, args) = argv.split_first().ok_or(Error::InitCommandEmpty)?;
    let command = argv.join(" ");
    tracing::info!(%command, dir = %root.display(), "running init command");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| return Error::InitSpawn { command: command.clone(), source })?;

    if let Some(stdout) = child.stdout.take()
        && let Err(read_error) = stream_lines(stdout, &mut on_line)
    {
        if let Err(e) = child.kill() {
            tracing::debug!(%command, error = %e, "init command already exited");
        }
        child.wait()?;
        return Err(Error::Io(read_error));
    }

    let status = child.wait()?;
    tracing::info!(%command, %status, "init command finished");
    if !status.success() {
        return Err(Error::InitFailed { code: status.code(), command });
    }
    return Ok(());
}

/// Pass each line of `output` to `on_line` until it ends or fails to read.
///
/// # Errors
///
/// Returns the first read error, including output that is not UTF-8.
fn stream_lines(output: impl Read, on_line: &mut impl FnMut(&str)) -> std::io::Result<()> {
    for line in BufReader::new(output).lines() {
        on_line(&line?);
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK_NAME: &str = ".terraform.lock.hcl";

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn directory_without_tf_files_is_not_a_configuration() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", "# hi");
        assert_eq!(ProjectState::detect(dir.path(), LOCK_NAME).unwrap(), ProjectState::NotAConfiguration);
    }

    #[test]
    fn missing_working_directory_is_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.tf", "variable \"region\" {}\n");
        assert_eq!(
            ProjectState::detect(dir.path(), LOCK_NAME).unwrap(),
            ProjectState::Uninitialized(UninitializedReason::MissingWorkingDirectory)
        );
    }

    #[test]
    fn resources_without_lock_file_are_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.tf", "resource \"aws_instance\" \"web\" {\n}\n");
        std::fs::create_dir(dir.path().join(WORKING_DIRECTORY)).unwrap();
        assert_eq!(
            ProjectState::detect(dir.path(), LOCK_NAME).unwrap(),
            ProjectState::Uninitialized(UninitializedReason::MissingLockfile)
        );

        write(dir.path(), LOCK_NAME, "");
        assert_eq!(ProjectState::detect(dir.path(), LOCK_NAME).unwrap(), ProjectState::Initialized);
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(run_init(dir.path(), &[], |_| {}), Err(Error::InitCommandEmpty)));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let argv = ["tfdoc-no-such-program".to_string()];
        assert!(matches!(run_init(dir.path(), &argv, |_| {}), Err(Error::InitSpawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn streams_output_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let argv = ["sh", "-c", "echo Initializing; echo done"].map(String::from);
        let mut lines = Vec::new();
        run_init(dir.path(), &argv, |line| lines.push(line.to_string())).unwrap();
        assert_eq!(lines, ["Initializing", "done"]);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let argv = ["sh", "-c", "exit 3"].map(String::from);
        let err = run_init(dir.path(), &argv, |_| {}).unwrap_err();
        assert!(matches!(err, Error::InitFailed { code: Some(3), .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_output_stops_and_reaps_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let argv = ["sh", "-c", "printf 'ok\\n\\377\\n'; sleep 30"].map(String::from);
        let mut lines = Vec::new();
        let started = std::time::Instant::now();

        let err = run_init(dir.path(), &argv, |line| lines.push(line.to_string())).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
        assert_eq!(lines, ["ok"]);
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }
}
