//! Name-server reload signalling.
//!
//! Runs after a successful commit. A failure here is logged by the publisher
//! and never undoes the commit; the next run converges again.

use std::path::PathBuf;
use std::process::Command;

use hostmap_core::ReloadConfig;

use crate::error::ReloadError;
use crate::store::Revision;

pub trait Reloader: Send + Sync {
    /// Ask the name-server to pick up `revision`.
    fn reload(&self, revision: &Revision) -> Result<(), ReloadError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Build the reloader selected by configuration.
pub fn from_config(config: &ReloadConfig) -> Box<dyn Reloader> {
    match config {
        ReloadConfig::None => Box::new(NoopReloader),
        ReloadConfig::Marker { path } => Box::new(MarkerFileReloader::new(path.clone())),
        ReloadConfig::Command { program, args } => {
            Box::new(CommandReloader::new(program.clone(), args.clone()))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReloader;

impl Reloader for NoopReloader {
    fn reload(&self, _revision: &Revision) -> Result<(), ReloadError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Writes the committed revision id to a file. The name-server side compares
/// it against the id it last loaded and reloads on mismatch.
#[derive(Debug, Clone)]
pub struct MarkerFileReloader {
    path: PathBuf,
}

impl MarkerFileReloader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reloader for MarkerFileReloader {
    fn reload(&self, revision: &Revision) -> Result<(), ReloadError> {
        let io = |source| ReloadError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(&self.path, format!("{revision}\n")).map_err(io)
    }

    fn name(&self) -> &'static str {
        "marker"
    }
}

/// Runs a program such as `unbound-control reload`; non-zero exit fails.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Reloader for CommandReloader {
    fn reload(&self, revision: &Revision) -> Result<(), ReloadError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .env("HOSTMAP_REVISION", revision.as_str())
            .output()
            .map_err(|source| ReloadError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(ReloadError::Command {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn marker_reloader_writes_revision() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("state").join("records.loaded");
        let revision = Revision::of(b"records");
        MarkerFileReloader::new(&path).reload(&revision).expect("reload");
        let written = std::fs::read_to_string(&path).expect("marker");
        assert_eq!(written.trim(), revision.as_str());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let reloader = CommandReloader::new("/nonexistent/hostmap-reload", vec![]);
        let err = reloader.reload(&Revision::of(b"x")).unwrap_err();
        assert!(matches!(err, ReloadError::Spawn { .. }), "got: {err}");
    }

    #[test]
    #[cfg(unix)]
    fn non_zero_exit_is_a_command_error() {
        let reloader = CommandReloader::new("sh", vec!["-c".into(), "echo nope >&2; exit 3".into()]);
        let err = reloader.reload(&Revision::of(b"x")).unwrap_err();
        match err {
            ReloadError::Command { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_selects_reloader() {
        assert_eq!(from_config(&ReloadConfig::None).name(), "none");
        assert_eq!(from_config(&ReloadConfig::default()).name(), "marker");
        let command = ReloadConfig::Command {
            program: "unbound-control".into(),
            args: vec!["reload".into()],
        };
        assert_eq!(from_config(&command).name(), "command");
    }
}
