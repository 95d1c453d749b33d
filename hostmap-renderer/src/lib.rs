//! # hostmap-renderer
//!
//! Tera-based rendering of a [`RecordSet`](hostmap_core::RecordSet) into
//! name-server configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hostmap_core::{config::OutputConfig, RecordSet};
//! use hostmap_renderer::Renderer;
//!
//! fn print_config(records: &RecordSet) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(text) = renderer.render(records, &OutputConfig::default()) {
//!             print!("{text}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::RenderContext;
pub use engine::{Renderer, UNBOUND_RECORDS_TEMPLATE};
pub use error::RenderError;
