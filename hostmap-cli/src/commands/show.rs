//! `hostmap show`: the currently published record set.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hostmap_core::Config;
use hostmap_sync::{load_persisted, FileBlobStore, Persisted};

/// Arguments for `hostmap show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ShowJson {
    revision: Option<String>,
    records: Vec<RecordRow>,
}

#[derive(Serialize, Tabled)]
struct RecordRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "address")]
    address: String,
}

impl ShowArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let store = FileBlobStore::new(&config.store.dir);
        let persisted = load_persisted(&store, &config.store.key).with_context(|| {
            format!(
                "failed to read published set from {}",
                store.path_of(&config.store.key).display()
            )
        })?;

        if self.json {
            print_json(persisted)?;
            return Ok(());
        }
        print_table(persisted);
        Ok(())
    }
}

fn rows(persisted: &Persisted) -> Vec<RecordRow> {
    persisted
        .records
        .canonical()
        .into_iter()
        .map(|r| RecordRow {
            name: r.name,
            address: r.address,
        })
        .collect()
}

fn print_json(persisted: Persisted) -> Result<()> {
    let payload = ShowJson {
        records: rows(&persisted),
        revision: persisted.revision.map(|r| r.as_str().to_string()),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize record set")?
    );
    Ok(())
}

fn print_table(persisted: Persisted) {
    let Some(revision) = persisted.revision.as_ref() else {
        println!("Nothing published yet.");
        return;
    };
    println!(
        "hostmap v{} | {} records | revision {}",
        env!("CARGO_PKG_VERSION"),
        persisted.records.len(),
        revision,
    );
    let mut table = Table::new(rows(&persisted));
    table.with(Style::rounded());
    println!("{table}");
}
