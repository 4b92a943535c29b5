//! Appending and removing route file entries.
//!
//! Appends open the file without `create`, so a route file that was never
//! provisioned can not be conjured into existence by a typo'd domain base.
//! Removals rewrite the file through a temporary sibling and an atomic
//! rename, keeping the remaining lines in order.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use super::index::identity_key;
use crate::errors::RouteError;

/// Stateless route file mutations.
pub struct RouteWriter;

impl RouteWriter {
    /// Whether the route file at `path` has been provisioned.
    ///
    /// Anything that exists and is not a directory counts, so a route file
    /// may be a symlink into another tree.
    pub fn is_provisioned(path: &Path) -> bool {
        fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
    }

    /// Check that `path` is provisioned and can be opened for appending.
    ///
    /// Run before any override removal so an unwritable target fails the
    /// address with the tree still intact.
    pub fn ensure_writable(path: &Path) -> Result<(), RouteError> {
        open_for_append(path).map(drop)
    }

    /// Append `identity` as a new line of the existing route file at `path`.
    pub fn append(path: &Path, identity: &str) -> Result<(), RouteError> {
        let mut file = open_for_append(path)?;

        let mut line = String::with_capacity(identity.len() + 2);
        if missing_trailing_newline(&mut file).map_err(|e| write_error(path, e))? {
            line.push('\n');
        }
        line.push_str(identity);
        line.push('\n');

        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| write_error(path, e))?;

        debug!(path = %path.display(), identity, "appended route entry");
        Ok(())
    }

    /// Remove every line equal to `identity` (case-insensitive) from `path`.
    ///
    /// Returns the number of lines removed; the file is left untouched when
    /// nothing matches.
    pub fn remove(path: &Path, identity: &str) -> Result<usize, RouteError> {
        let Some(key) = identity_key(identity) else {
            return Ok(0);
        };

        let contents = fs::read_to_string(path).map_err(|e| write_error(path, e))?;

        let mut removed = 0usize;
        let mut kept = String::with_capacity(contents.len());
        for line in contents.split_inclusive('\n') {
            if identity_key(line).as_deref() == Some(key.as_str()) {
                removed += 1;
            } else {
                kept.push_str(line);
            }
        }

        if removed == 0 {
            return Ok(0);
        }

        rewrite(path, &kept).map_err(|e| write_error(path, e))?;
        debug!(path = %path.display(), identity, removed, "removed route entries");
        Ok(removed)
    }
}

fn write_error(path: &Path, source: io::Error) -> RouteError {
    RouteError::WriteError {
        path: path.to_path_buf(),
        source,
    }
}

fn open_for_append(path: &Path) -> Result<File, RouteError> {
    let missing = || RouteError::RouteFileMissing {
        path: path.to_path_buf(),
    };
    if !RouteWriter::is_provisioned(path) {
        return Err(missing());
    }

    OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => missing(),
            _ => write_error(path, e),
        })
}

fn missing_trailing_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn rewrite(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_example");
        fs::write(&path, "alice\n").unwrap();

        RouteWriter::append(&path, "jdoe").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "alice\njdoe\n");
    }

    #[test]
    fn test_append_to_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_example");
        fs::write(&path, "").unwrap();

        RouteWriter::append(&path, "jdoe").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "jdoe\n");
    }

    #[test]
    fn test_append_adds_missing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_example");
        fs::write(&path, "alice").unwrap();

        RouteWriter::append(&path, "jdoe").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "alice\njdoe\n");
    }

    #[test]
    fn test_append_never_creates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_missing");

        let result = RouteWriter::append(&path, "jdoe");
        assert!(matches!(result, Err(RouteError::RouteFileMissing { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_keeps_order_of_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_otrs_example");
        fs::write(&path, "alice\nJDoe\nbob\njdoe\ncarol").unwrap();

        let removed = RouteWriter::remove(&path, "jdoe").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "alice\nbob\ncarol");
    }

    #[test]
    fn test_remove_no_match_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_otrs_example");
        fs::write(&path, "alice\njdoe2\n").unwrap();

        assert_eq!(RouteWriter::remove(&path, "jdoe").unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "alice\njdoe2\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_otrs_example");
        fs::write(&path, "jdoe\nalice\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        RouteWriter::remove(&path, "jdoe").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_directory_is_not_a_route_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_example");
        fs::create_dir(&path).unwrap();

        assert!(!RouteWriter::is_provisioned(&path));
        assert!(matches!(
            RouteWriter::ensure_writable(&path),
            Err(RouteError::RouteFileMissing { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_append_reports_write_error_when_device_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_example");
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        RouteWriter::ensure_writable(&path).unwrap();
        let result = RouteWriter::append(&path, "jdoe");
        match result {
            Err(RouteError::WriteError { path: failed, source }) => {
                assert_eq!(failed, path);
                assert_eq!(source.raw_os_error(), Some(libc::ENOSPC));
            }
            other => panic!("expected WriteError, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_writable_rejects_read_only_file() {
        use std::os::unix::fs::PermissionsExt;

        // Root ignores file modes.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_google_example");
        fs::write(&path, "alice\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        assert!(matches!(
            RouteWriter::ensure_writable(&path),
            Err(RouteError::WriteError { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "alice\n");
    }

    #[test]
    fn test_remove_from_vanished_file_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow_route_otrs_gone");

        let result = RouteWriter::remove(&path, "jdoe");
        assert!(matches!(result, Err(RouteError::WriteError { .. })));
    }
}
