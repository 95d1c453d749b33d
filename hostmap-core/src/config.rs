//! Engine configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.hostmap/
//!   config.yaml        (optional; defaults apply when absent)
//!   state/
//!     records.json.gz  (published record set)
//! ```
//!
//! As with every path-taking API in this workspace, [`load_at`] takes the
//! explicit location and [`load`] derives it from `dirs::home_dir()`. Tests
//! always use `load_at`.
//!
//! Relative paths and a leading `~/` in `store.dir` / `reload.path` are
//! resolved against the home directory by [`Config::resolve_paths`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Which upstream schema the inventory adapter expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InventorySchema {
    /// `IPAddresses: [{IPAddress}]` (HSM v2).
    #[default]
    Nested,
    /// Legacy flat `IPAddress` string (HSM v1).
    Flat,
}

/// Endpoint locations for the three sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub lease_url: String,
    pub inventory_url: String,
    pub topology_url: String,
    pub inventory_schema: InventorySchema,
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            lease_url: "http://cray-dhcp-kea-api:8000".to_string(),
            inventory_url: "http://cray-smd".to_string(),
            topology_url: "http://cray-sls".to_string(),
            inventory_schema: InventorySchema::Nested,
            timeout_secs: 30,
        }
    }
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fixed retry policy applied to every outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_ms: 3000,
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// Knobs for alias synthesis in the merger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Suffix for node-management-network aliases; `None` emits bare aliases.
    pub nmn_alias_suffix: Option<String>,
    /// Topology roles whose aliases get `-mgmt` / NMN records.
    pub alias_roles: Vec<String>,
    /// Network-name prefixes that collapse to a subdomain (`NMN_RVR` → `nmn`).
    pub subdomain_prefixes: Vec<String>,
    /// Only emit the bare nid HSN alias for this port index.
    pub hsn_port: Option<u32>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            nmn_alias_suffix: Some("-nmn".to_string()),
            alias_roles: vec!["Management".to_string(), "Application".to_string()],
            subdomain_prefixes: ["NMN", "HMN", "HSN", "MTL", "CAN"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            hsn_port: None,
        }
    }
}

/// Name-server rendering options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Emit reverse (`local-data-ptr`) entries.
    pub create_ptr_records: bool,
    /// Also emit `<name>.local` entries.
    pub local_suffix: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            create_ptr_records: true,
            local_suffix: true,
        }
    }
}

/// Where the published record set lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/.hostmap/state"),
            key: "records.json.gz".to_string(),
        }
    }
}

/// How the name-server is told to pick up a newly published set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReloadConfig {
    None,
    /// Write the committed revision id to `path`.
    Marker { path: PathBuf },
    /// Run `program args...`; a non-zero exit is a reload failure.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for ReloadConfig {
    fn default() -> Self {
        ReloadConfig::Marker {
            path: PathBuf::from("~/.hostmap/state/records.loaded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Root of `config.yaml`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub retry: RetryPolicy,
    pub merge: MergeConfig,
    pub output: OutputConfig,
    pub store: StoreConfig,
    pub reload: ReloadConfig,
}

impl Config {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for (field, url) in [
            ("sources.lease_url", &self.sources.lease_url),
            ("sources.inventory_url", &self.sources.inventory_url),
            ("sources.topology_url", &self.sources.topology_url),
        ] {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        if self.store.key.trim().is_empty() || self.store.key.contains('/') {
            return Err(ConfigError::Invalid(
                "store.key must be a plain, non-empty file name".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand `~/` and relative paths in `store.dir` and the marker path
    /// against `home`.
    pub fn resolve_paths(mut self, home: &Path) -> Self {
        self.store.dir = resolve_path(home, &self.store.dir);
        if let ReloadConfig::Marker { path } = &mut self.reload {
            *path = resolve_path(home, path);
        }
        self
    }
}

fn resolve_path(home: &Path, path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        return home.join(rest);
    }
    if path.is_relative() {
        return home.join(path);
    }
    path.to_path_buf()
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.hostmap/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".hostmap").join("config.yaml")
}

/// Load and validate the config at `path`, resolving paths against `home`.
///
/// A missing file yields [`Config::default`]; malformed YAML is a
/// [`ConfigError::Parse`] naming the file.
pub fn load_at(path: &Path, home: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
    } else {
        Config::default()
    };
    config.validate()?;
    Ok(config.resolve_paths(home))
}

/// `load_at` convenience wrapper: `explicit` or `~/.hostmap/config.yaml`.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_path_at(&home));
    load_at(&path, &home)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
