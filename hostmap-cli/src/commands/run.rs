//! `hostmap run`: one full reconciliation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use hostmap_core::Config;
use hostmap_runtime::{block_on, run_once};
use hostmap_sources::build_transport;
use hostmap_sync::{Decision, RunReport};

/// Arguments for `hostmap run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Go through every phase but never publish.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let dry_run = self.dry_run;
        let report = block_on(|token| {
            let transport = build_transport(&config, token.clone());
            run_once(config, transport, token, dry_run)
        })
        .context("reconciliation run failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
            return Ok(());
        }

        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let decision = match report.decision {
        Decision::NoChange => report.decision.to_string().green(),
        Decision::Publish => report.decision.to_string().cyan(),
        Decision::DegradedPublish => report.decision.to_string().yellow(),
        Decision::Abstain => report.decision.to_string().red(),
    };
    println!(
        "{prefix}{} {} records (previously {})",
        decision.bold(),
        report.current,
        report.previous,
    );

    if report.failed_sources.any() {
        println!("  failed sources: {}", report.failed_sources.to_string().red());
    }

    match &report.published {
        Some(published) => {
            println!("  ✎  revision {}", published.revision);
            if !published.reloaded {
                let note = if report.current == 0 {
                    "empty set published; name server not reloaded"
                } else {
                    "name-server reload failed; see log"
                };
                println!("  {}", note.yellow());
            }
        }
        None if report.dry_run && report.decision.should_publish() => {
            println!("  ~  would publish {} records", report.current);
        }
        None => println!("  ·  published set left untouched"),
    }
}
