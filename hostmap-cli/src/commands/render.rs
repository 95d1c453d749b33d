//! `hostmap render`: the published set as Unbound configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hostmap_core::Config;
use hostmap_renderer::Renderer;
use hostmap_sync::{load_persisted, write_rendered, FileBlobStore, WriteResult};

/// Arguments for `hostmap render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Write to this file (skipped when unchanged) instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Omit `local-data-ptr` reverse entries.
    #[arg(long)]
    pub no_ptr: bool,
}

impl RenderArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let store = FileBlobStore::new(&config.store.dir);
        let persisted =
            load_persisted(&store, &config.store.key).context("failed to read published set")?;

        let mut output = config.output.clone();
        if self.no_ptr {
            output.create_ptr_records = false;
        }

        let Some(path) = self.output else {
            let text = Renderer::new()
                .and_then(|r| r.render(&persisted.records, &output))
                .context("failed to render record set")?;
            print!("{text}");
            return Ok(());
        };

        match write_rendered(&path, &persisted.records, &output, false)
            .with_context(|| format!("failed to write {}", path.display()))?
        {
            WriteResult::Written { path } => println!("✎  {}", path.display()),
            WriteResult::Unchanged { path } => println!("·  {} (unchanged)", path.display()),
            WriteResult::WouldWrite { path } => println!("~  {}", path.display()),
        }
        Ok(())
    }
}
