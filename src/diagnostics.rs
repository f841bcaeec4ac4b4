use std::path::Path;

use crate::error::Error;

/// ANSI bold, applied to heading lines.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic: what happened, and how to fix it.
pub fn render_error(e: &Error) -> String {
    match e {
        Error::InvalidPosition { file, line, column, line_count } => {
            render_invalid_position(file, *line, *column, *line_count)
        },
        Error::LockfileNotFound { path } => render_lockfile_not_found(path),
        Error::NotAConfiguration { path } => render_not_a_configuration(path),
        Error::InitCommandEmpty => render_init_command_empty(),
        Error::InitFailed { command, code } => render_init_failed(command, *code),
        Error::InitSpawn { command, source } => render_init_spawn(command, source),
        _ => render_generic(e),
    }
}

/// Errors whose message needs no extra context beyond a heading.
fn render_generic(e: &Error) -> String {
    match e {
        Error::FileNotFound { path } => format!("\
# Error: File Not Found

`{}` does not exist.
", path.display()),

        Error::TomlDe(e) => format!("\
# Error: Invalid Config

`.tfdoc.toml` could not be parsed:

{e}

## Fix

Recognized keys: `strategy`, `registry_url`, `latest`, `lookup_timeout_ms`,
`lockfile`, `init_command`.
"),

        Error::HttpClient(e) => format!("\
# Error: HTTP Client

{e}

## Fix

Skip the latest-version lookup:

    tfdoc lookup --offline ...
"),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        _ => format!("\
# Error

{e}
"),
    }
}

/// A position outside the file.
fn render_invalid_position(file: &Path, line: usize, column: usize, line_count: usize) -> String {
    format!("\
# Error: Invalid Position

`{line}:{column}` is outside `{}`, which has {line_count} lines.

Lines and columns are one-based.
", file.display())
}

/// No lock file where one is required.
fn render_lockfile_not_found(path: &Path) -> String {
    format!("\
# Error: Lockfile Not Found

No `.terraform.lock.hcl` in `{}` or any parent directory.

## Fix

Initialize the configuration to create it:

    tfdoc init
", path.display())
}

/// A directory with no configuration files.
fn render_not_a_configuration(path: &Path) -> String {
    format!("\
# Error: Not A Configuration

`{}` contains no `.tf` files.
", path.display())
}

/// An `init_command` with no program.
fn render_init_command_empty() -> String {
    "\
# Error: Empty Init Command

`init_command` in `.tfdoc.toml` must name a program.

## Fix

    init_command = [\"terraform\", \"init\"]
"
    .to_string()
}

/// An init command that exited unsuccessfully.
fn render_init_failed(command: &str, code: Option<i32>) -> String {
    let status = code.map_or_else(|| "was terminated by a signal".to_string(), |c| format!("exited with code {c}"));
    format!("\
# Error: Init Failed

`{command}` {status}. Its output is shown above.
")
}

/// An init command that could not be started.
fn render_init_spawn(command: &str, source: &std::io::Error) -> String {
    format!("\
# Error: Init Command Not Started

`{command}` could not be started: {source}

## Fix

Install the tool, or point `init_command` in `.tfdoc.toml` at it.
")
}
