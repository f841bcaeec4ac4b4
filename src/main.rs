mod commands;
mod config;
mod constraint;
mod context;
mod diagnostics;
mod error;
mod lockfile;
mod project;
mod registry;
mod semver;
mod target;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Overrides;

#[derive(Parser)]
#[command(name = "tfdoc", version, about = "Documentation lookup and navigation for Terraform configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase log verbosity (-v info, -vv debug). `TFDOC_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Flags shared by commands that build documentation links.
#[derive(Args)]
struct LinkFlags {
    /// Print JSON instead of plain text
    #[arg(long)]
    json: bool,
    /// Never query the registry for the latest published version
    #[arg(long)]
    offline: bool,
    /// Version strategy for constrained providers: low, middle, or high
    #[arg(long)]
    strategy: Option<String>,
}

impl LinkFlags {
    /// Command-line settings that override `.tfdoc.toml`.
    fn overrides(&self) -> Overrides {
        return Overrides {
            offline: self.offline,
            strategy: self.strategy.clone(),
        };
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured init command, streaming its output
    Init,
    /// List every resource, data source, and module in a file with its target
    Links {
        /// Configuration file to scan
        file: PathBuf,
        #[command(flatten)]
        flags: LinkFlags,
    },
    /// Resolve the construct at a position to a documentation URL or local file
    Lookup {
        /// Configuration file
        file: PathBuf,
        /// One-based line
        line: usize,
        /// One-based column
        column: usize,
        #[command(flatten)]
        flags: LinkFlags,
    },
    /// Report whether the configuration needs initializing
    Status,
    /// List locked providers and the versions documentation links use
    Versions {
        #[command(flatten)]
        flags: LinkFlags,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init(),
        Commands::Links { file, flags } => commands::links(&file, flags.json, &flags.overrides()),
        Commands::Lookup { file, line, column, flags } => {
            commands::lookup(&file, line, column, flags.json, &flags.overrides())
        },
        Commands::Status => commands::status(),
        Commands::Versions { flags } => commands::versions(flags.json, &flags.overrides()),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3)
        },
    };
}

/// Log to stderr, filtered by `TFDOC_LOG` or the `-v` count.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("TFDOC_LOG").unwrap_or_else(|_| return EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
