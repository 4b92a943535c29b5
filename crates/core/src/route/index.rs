//! In-memory identity → route file index.
//!
//! Built by scanning a backend's output tree once at the start of a run and
//! updated in place as entries are appended or removed, so conflict checks
//! never rescan the tree.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::locator::RouteFileLocator;
use crate::errors::IndexError;

/// Normalized comparison key for a route file line or identity.
///
/// Returns `None` for blank lines.
pub fn identity_key(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

/// Index of every identity found under one route tree.
#[derive(Debug, Default)]
pub struct RouteIndex {
    entries: HashMap<String, BTreeSet<PathBuf>>,
    files: BTreeSet<PathBuf>,
}

impl RouteIndex {
    /// Scan `root` recursively and index every route file found.
    pub fn build(root: &Path) -> Result<Self, IndexError> {
        info!(root = %root.display(), "building route index");

        let mut index = Self::default();
        index.scan_dir(root)?;

        info!(
            files = index.files.len(),
            identities = index.entries.len(),
            "route index built"
        );
        Ok(index)
    }

    fn scan_dir(&mut self, dir: &Path) -> Result<(), IndexError> {
        let unreadable = |source| IndexError::Unreadable {
            path: dir.to_path_buf(),
            source,
        };

        let entries = fs::read_dir(dir).map_err(unreadable)?;
        for entry in entries {
            let entry = entry.map_err(unreadable)?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(unreadable)?;

            if file_type.is_dir() {
                self.scan_dir(&path)?;
                continue;
            }

            let is_route_file = entry
                .file_name()
                .to_str()
                .map(RouteFileLocator::is_route_file_name)
                .unwrap_or(false);
            // Only regular files are read; device or dangling routes can't hold entries.
            if !is_route_file || !path.is_file() {
                continue;
            }

            let contents = fs::read_to_string(&path).map_err(|source| IndexError::Unreadable {
                path: path.clone(),
                source,
            })?;
            self.index_file(path, &contents);
        }
        Ok(())
    }

    fn index_file(&mut self, path: PathBuf, contents: &str) {
        let mut count = 0usize;
        for key in contents.lines().filter_map(identity_key) {
            self.entries.entry(key).or_default().insert(path.clone());
            count += 1;
        }
        debug!(path = %path.display(), entries = count, "indexed route file");
        self.files.insert(path);
    }

    /// Route files currently holding `identity` (case-insensitive), sorted.
    pub fn locations(&self, identity: &str) -> Vec<PathBuf> {
        identity_key(identity)
            .and_then(|key| self.entries.get(&key))
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        !self.locations(identity).is_empty()
    }

    /// Note that `identity` was appended to `path`.
    pub fn record(&mut self, identity: &str, path: &Path) {
        if let Some(key) = identity_key(identity) {
            self.entries.entry(key).or_default().insert(path.to_path_buf());
            self.files.insert(path.to_path_buf());
        }
    }

    /// Note that every `identity` line was removed from `path`.
    pub fn forget(&mut self, identity: &str, path: &Path) {
        let Some(key) = identity_key(identity) else {
            return;
        };
        if let Some(files) = self.entries.get_mut(&key) {
            files.remove(path);
            if files.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Number of route files scanned or written.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of distinct identities.
    pub fn identity_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key() {
        assert_eq!(identity_key("JDoe\r"), Some("jdoe".to_string()));
        assert_eq!(identity_key("  alice  "), Some("alice".to_string()));
        assert_eq!(identity_key("   "), None);
    }

    #[test]
    fn test_build_scans_route_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("shadow_route_google_example"), "jdoe\nalice\n").unwrap();
        fs::create_dir(root.join("legacy")).unwrap();
        fs::write(root.join("legacy/shadow_route_google_acme"), "JDOE\n\nbob").unwrap();
        fs::write(root.join("notes.txt"), "carol\n").unwrap();

        let index = RouteIndex::build(root).unwrap();
        assert_eq!(index.file_count(), 2);
        assert_eq!(index.identity_count(), 3);
        assert_eq!(
            index.locations("jdoe"),
            vec![
                root.join("legacy/shadow_route_google_acme"),
                root.join("shadow_route_google_example"),
            ]
        );
        assert_eq!(index.locations("Bob"), vec![root.join("legacy/shadow_route_google_acme")]);
        assert!(!index.contains("carol"));
    }

    #[test]
    fn test_record_and_forget() {
        let mut index = RouteIndex::default();
        let a = PathBuf::from("/t/shadow_route_google_a");
        let b = PathBuf::from("/t/shadow_route_google_b");

        index.record("jdoe", &a);
        index.record("JDoe", &b);
        assert_eq!(index.locations("jdoe"), vec![a.clone(), b.clone()]);

        index.forget("jdoe", &a);
        assert_eq!(index.locations("jdoe"), vec![b.clone()]);

        index.forget("jdoe", &b);
        assert!(!index.contains("jdoe"));
        assert_eq!(index.identity_count(), 0);
    }

    #[test]
    fn test_build_missing_root() {
        let result = RouteIndex::build(Path::new("/nonexistent/route/tree"));
        assert!(matches!(result, Err(IndexError::Unreadable { .. })));
    }
}
