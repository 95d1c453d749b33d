//! `hostmap diff`: what a run would change, without publishing.

use anyhow::{Context, Result};
use clap::Args;

use hostmap_core::Config;
use hostmap_runtime::{block_on, plan_once};
use hostmap_sources::build_transport;
use hostmap_sync::diff::unified_diff;

/// Arguments for `hostmap diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let plan = block_on(|token| {
            let transport = build_transport(&config, token.clone());
            plan_once(config, transport, token)
        })
        .context("could not compute the current record set")?;

        let (persisted, computed) = (&plan.persisted.records, &plan.result.master);
        let diff = unified_diff(persisted, computed);
        if diff.is_empty() {
            println!("No differences ({} records).", computed.len());
        } else {
            print!("{diff}");
            if !diff.ends_with('\n') {
                println!();
            }
            println!(
                "{} added, {} removed",
                computed.difference(persisted).count(),
                persisted.difference(computed).count(),
            );
        }
        if plan.result.source_errors.any() {
            println!(
                "failed sources: {} (a run would {})",
                plan.result.source_errors, plan.decision
            );
        }
        Ok(())
    }
}
