//! Tera rendering engine for Unbound `local-data` configuration.
//!
//! # Output shape
//!
//! One block per record, in canonical order:
//!
//! ```text
//! local-data: "<name> A <addr>"
//! local-data-ptr: "<addr> <name>"              (create_ptr_records)
//! local-data: "<name>.local A <addr>"          (local_suffix)
//! local-data-ptr: "<addr> <name>.local"        (both)
//! ```

use tera::Tera;

use hostmap_core::config::OutputConfig;
use hostmap_core::RecordSet;

use crate::context::RenderContext;
use crate::error::RenderError;

/// Name of the embedded records template.
pub const UNBOUND_RECORDS_TEMPLATE: &str = "unbound/records.conf.tera";

// Embedded templates, baked into the binary at compile time via include_str!
const TPLS: &[(&str, &str)] = &[(
    UNBOUND_RECORDS_TEMPLATE,
    include_str!("templates/records.conf.tera"),
)];

fn build_tera() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TPLS.iter().copied())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders record sets with the embedded templates. Create once and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera()? })
    }

    /// Render `records` as Unbound `local-data` lines.
    pub fn render(&self, records: &RecordSet, output: &OutputConfig) -> Result<String, RenderError> {
        let ctx = RenderContext::from_records(records, output);
        self.render_with_context(&ctx)
    }

    /// Render using a caller-provided [`RenderContext`].
    pub fn render_with_context(&self, ctx: &RenderContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let rendered = self.tera.render(UNBOUND_RECORDS_TEMPLATE, &tera_ctx)?;
        Ok(rendered.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
