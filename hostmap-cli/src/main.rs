//! hostmap: reconcile DNS host records from the site's inventory services.
//!
//! # Usage
//!
//! ```text
//! hostmap run    [--config PATH] [--dry-run] [--json] [--log-format text|json]
//! hostmap diff   [--config PATH]
//! hostmap show   [--config PATH] [--json]
//! hostmap render [--config PATH] [--output PATH] [--no-ptr]
//! ```

mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, render::RenderArgs, run::RunArgs, show::ShowArgs};
use hostmap_core::Config;
use hostmap_runtime::{init_tracing, LogFormat};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hostmap",
    version,
    about = "Reconcile DNS host records from lease, inventory and topology services",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.hostmap/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Diagnostic output format on stderr: text or json.
    #[arg(long, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect, merge, diff, and publish when the decision allows it.
    Run(RunArgs),

    /// Show a unified diff between the published set and a fresh merge.
    Diff(DiffArgs),

    /// Print the currently published record set.
    Show(ShowArgs),

    /// Render the published set as name-server configuration.
    Render(RenderArgs),
}

/// Load the config named by `--config`, or the default location.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<Config> {
    hostmap_core::config::load(explicit).with_context(|| match explicit {
        Some(path) => format!("failed to load config {}", path.display()),
        None => "failed to load ~/.hostmap/config.yaml".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Run(args) => args.run(config),
        Commands::Diff(args) => args.run(config),
        Commands::Show(args) => args.run(config),
        Commands::Render(args) => args.run(config),
    }
}
