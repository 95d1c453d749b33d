//! Template context: serializable rendering payload built from a [`RecordSet`].

use serde::{Deserialize, Serialize};

use hostmap_core::config::OutputConfig;
use hostmap_core::RecordSet;

use crate::error::RenderError;

/// Everything a name-server template may reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderContext {
    /// Records in canonical order (name, then address).
    pub records: Vec<RecordCtx>,
    /// Emit `local-data-ptr` reverse entries.
    pub create_ptr_records: bool,
    /// Emit a second `<name>.local` entry per record.
    pub local_suffix: bool,
    pub meta: MetaCtx,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordCtx {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub hostmap_version: String,
    pub record_count: usize,
}

impl RenderContext {
    pub fn from_records(records: &RecordSet, output: &OutputConfig) -> Self {
        let records: Vec<RecordCtx> = records
            .canonical()
            .into_iter()
            .map(|r| RecordCtx {
                name: r.name,
                address: r.address,
            })
            .collect();
        RenderContext {
            meta: MetaCtx {
                hostmap_version: env!("CARGO_PKG_VERSION").to_string(),
                record_count: records.len(),
            },
            records,
            create_ptr_records: output.create_ptr_records,
            local_suffix: output.local_suffix,
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        let value = serde_json::to_value(self)?;
        Ok(tera::Context::from_value(value)?)
    }
}
