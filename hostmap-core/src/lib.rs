//! hostmap core library: domain types, configuration and errors.
//!
//! - [`types`]: [`DnsRecord`], [`RecordSet`], source bookkeeping
//! - [`config`]: [`Config`] and its YAML loader
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, InventorySchema, MergeConfig, ReloadConfig, RetryPolicy};
pub use error::ConfigError;
pub use types::{DnsRecord, RecordSet, RunResult, SourceErrors, SourceKind};
