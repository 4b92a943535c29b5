//! Conflict detection against the route index.

use std::path::PathBuf;

use tracing::debug;

use crate::route::RouteIndex;

/// An identity already present somewhere in the route tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The identity as requested by the caller.
    pub identity: String,
    /// Every route file holding it, sorted.
    pub files: Vec<PathBuf>,
}

/// Stateless conflict scanner.
pub struct ConflictScanner;

impl ConflictScanner {
    /// Look `identity` up across the whole tree (case-insensitive).
    pub fn scan(index: &RouteIndex, identity: &str) -> Option<Conflict> {
        let files = index.locations(identity);
        if files.is_empty() {
            return None;
        }
        debug!(identity, files = files.len(), "identity already routed");
        Some(Conflict {
            identity: identity.to_string(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_no_conflict() {
        let index = RouteIndex::default();
        assert!(ConflictScanner::scan(&index, "jdoe").is_none());
    }

    #[test]
    fn test_conflict_is_case_insensitive() {
        let mut index = RouteIndex::default();
        index.record("JDoe", Path::new("/t/shadow_route_google_a"));

        let conflict = ConflictScanner::scan(&index, "jdoe").unwrap();
        assert_eq!(conflict.identity, "jdoe");
        assert_eq!(conflict.files, vec![PathBuf::from("/t/shadow_route_google_a")]);
    }
}
