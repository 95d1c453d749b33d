//! Hash-gated atomic writer for rendered name-server configuration.
//!
//! ## `atomic_write` protocol
//!
//! 1. Normalise line endings and SHA-256 hash the content.
//! 2. Hash the existing file, if any; skip the write if identical.
//! 3. Write to `<path>.hostmap.tmp`.
//! 4. Rename to final path (atomic on POSIX).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use hostmap_core::config::OutputConfig;
use hostmap_core::RecordSet;
use hostmap_renderer::Renderer;

use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: content hash matches the file on disk.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

/// Render `records` and write them to `path` if the content changed.
pub fn write_rendered(
    path: &Path,
    records: &RecordSet,
    output: &OutputConfig,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let content = Renderer::new()?.render(records, output)?;
    atomic_write(path, &content, dry_run)
}

pub fn atomic_write(path: &Path, content: &str, dry_run: bool) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.hostmap.tmp", path.display()));
    atomic_write_with_tmp(path, content, dry_run, &tmp)
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

fn existing_digest(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(digest(&bytes))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    dry_run: bool,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    let normalized = content.replace("\r\n", "\n");
    let content = normalized.as_str();

    if existing_digest(path)?.as_deref() == Some(digest(content.as_bytes()).as_str()) {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("records.conf");
        let result = atomic_write(&path, "hello", false).expect("write");
        assert!(matches!(result, WriteResult::Written { .. }));
        assert!(path.exists());
    }

    #[test]
    fn same_content_is_unchanged_and_keeps_mtime() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("records.conf");
        atomic_write(&path, "same content", false).expect("first");
        let mtime_1 = fs::metadata(&path).expect("meta").modified().expect("mtime");

        sleep(Duration::from_millis(1100));
        let result = atomic_write(&path, "same content", false).expect("second");
        assert!(matches!(result, WriteResult::Unchanged { .. }));
        let mtime_2 = fs::metadata(&path).expect("meta").modified().expect("mtime");
        assert_eq!(mtime_2, mtime_1, "mtime changed; file was rewritten");
    }

    #[test]
    fn dry_run_does_not_write_file() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("nope.conf");
        let result = atomic_write(&path, "content", true).expect("dry run");
        assert!(matches!(result, WriteResult::WouldWrite { .. }));
        assert!(!path.exists(), "dry-run must not create files");
    }

    #[test]
    fn tmp_file_removed_and_parents_created() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("unbound").join("records.conf");
        atomic_write(&path, "data", false).expect("write");
        assert!(path.exists());
        let tmp_path = PathBuf::from(format!("{}.hostmap.tmp", path.display()));
        assert!(!tmp_path.exists(), ".hostmap.tmp must be cleaned up");
    }

    #[test]
    fn crlf_and_lf_content_share_the_same_hash() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("normalize.conf");
        let first = atomic_write(&path, "line1\r\nline2\r\n", false).expect("first");
        assert!(matches!(first, WriteResult::Written { .. }));
        let second = atomic_write(&path, "line1\nline2\n", false).expect("second");
        assert!(matches!(second, WriteResult::Unchanged { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), "line1\nline2\n");
    }

    #[test]
    fn write_rendered_emits_unbound_lines() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("records.conf");
        let mut set = RecordSet::new();
        set.push("uan01", "10.252.1.20");
        write_rendered(&path, &set, &OutputConfig::default(), false).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains(r#"local-data: "uan01 A 10.252.1.20""#));
    }

    #[test]
    #[cfg(unix)]
    fn failed_swap_keeps_previously_rendered_records() {
        use std::os::unix::fs::PermissionsExt;

        let output = OutputConfig::default();
        let unbound = TempDir::new().expect("unbound");
        let conf_dir = unbound.path().join("conf.d");
        let records_conf = conf_dir.join("records.conf");

        let mut published = RecordSet::new();
        published.push("uan01", "10.252.1.20");
        write_rendered(&records_conf, &published, &output, false).expect("publish");

        let mut next = RecordSet::new();
        next.push("uan01", "10.252.1.20");
        next.push("uan02", "10.252.1.21");
        let rendered = Renderer::new()
            .expect("renderer")
            .render(&next, &output)
            .expect("render");

        let set_mode = |mode| {
            let mut perms = fs::metadata(&conf_dir).expect("meta").permissions();
            perms.set_mode(mode);
            fs::set_permissions(&conf_dir, perms).expect("chmod");
        };
        let staging = TempDir::new().expect("staging");
        let staged = staging.path().join("records.conf.hostmap.tmp");

        set_mode(0o555);
        let swap = atomic_write_with_tmp(&records_conf, &rendered, false, &staged);
        set_mode(0o755);

        // Root ignores directory permissions, so the swap may succeed there.
        if swap.is_err() {
            let text = fs::read_to_string(&records_conf).expect("read");
            assert!(text.contains("uan01 A 10.252.1.20"));
            assert!(!text.contains("uan02"), "half-published content: {text}");
            assert!(!staged.exists(), "staged file left behind");
        }
    }
}
