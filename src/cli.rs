use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::platform::Platform;

#[derive(Parser, Debug)]
#[command(name = "runtime-fetcher")]
#[command(version, about = "Download, verify and run the Bun runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding installations (defaults to the user cache directory)
    #[arg(long, global = true, env = "RUNTIME_FETCHER_ROOT")]
    pub root: Option<PathBuf>,

    /// Working directory for bun (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Abort a download after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Base URL for release assets
    #[arg(long, global = true, hide = true, env = "RUNTIME_FETCHER_DOWNLOAD_BASE")]
    pub download_base: Option<String>,

    /// Base URL for release checksum pages
    #[arg(long, global = true, hide = true, env = "RUNTIME_FETCHER_CHECKSUM_BASE")]
    pub checksum_base: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Which distribution to act on.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Bun version, e.g. 1.1.0 (blank or unset means latest)
    #[arg(long, env = "RUNTIME_FETCHER_VERSION")]
    pub version: Option<String>,

    /// Platform variant, e.g. linux-x64-musl (auto-detected when unset)
    #[arg(short, long, env = "RUNTIME_FETCHER_PLATFORM")]
    pub platform: Option<Platform>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, verify and unpack bun (no-op when already installed)
    Setup {
        #[command(flatten)]
        target: TargetArgs,

        /// Show a full-screen progress dashboard
        #[arg(long)]
        tui: bool,
    },

    /// Run the installed bun with the given arguments (run setup first)
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Arguments passed to bun verbatim, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Set up bun, then run `bun install`
    Install {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Set up bun, then run `bun test`
    Test {
        #[command(flatten)]
        target: TargetArgs,

        /// Extra arguments for `bun test`, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Set up bun, then run `bun add <package>`
    Add {
        #[command(flatten)]
        target: TargetArgs,

        /// Package to add
        package: String,
    },

    /// Print the path of the installed bun executable
    Which {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List installed versions
    List,

    /// List supported platform variants
    Platforms,

    /// Remove installations
    Clean {
        /// Only remove this version
        #[arg(long)]
        version: Option<String>,
    },
}

impl Commands {
    pub fn is_tui(&self) -> bool {
        matches!(self, Commands::Setup { tui: true, .. })
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
