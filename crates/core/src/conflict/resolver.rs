//! Conflict resolution.
//!
//! Without override a conflict is a per-address failure and nothing is
//! touched. With override the identity is removed from every file holding
//! it, repairing stale or duplicate assignments before the new write.

use std::path::PathBuf;

use tracing::{error, info, warn};

use super::scanner::ConflictScanner;
use crate::context::RunContext;
use crate::errors::RouteError;
use crate::route::{RouteIndex, RouteWriter};

/// Stateless conflict resolution operations.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Make sure `identity` is absent from the tree.
    ///
    /// Returns the files it was removed from (empty when there was no
    /// conflict). The index is kept in step with every file rewritten, even
    /// when a later removal fails.
    pub fn clear(
        ctx: &RunContext,
        index: &mut RouteIndex,
        identity: &str,
        force: bool,
    ) -> Result<Vec<PathBuf>, RouteError> {
        let Some(conflict) = ConflictScanner::scan(index, identity) else {
            return Ok(Vec::new());
        };

        if !force {
            warn!(
                run_id = %ctx.run_id(),
                identity,
                files = conflict.files.len(),
                "identity conflict, override not requested"
            );
            return Err(RouteError::IdentityConflict {
                identity: conflict.identity,
                files: conflict.files,
            });
        }

        let mut displaced = Vec::with_capacity(conflict.files.len());
        for path in conflict.files {
            let removed = match RouteWriter::remove(&path, identity) {
                Ok(removed) => removed,
                Err(e) => {
                    Self::restore(ctx, index, identity, &displaced);
                    return Err(e);
                }
            };
            index.forget(identity, &path);
            info!(
                run_id = %ctx.run_id(),
                identity,
                path = %path.display(),
                removed,
                "override: removed conflicting entry"
            );
            displaced.push(path);
        }
        Ok(displaced)
    }

    /// Put `identity` back into each of `files` after a failed assignment.
    ///
    /// Failures are logged and skipped; the caller is already reporting the
    /// error that triggered the rollback.
    pub fn restore(ctx: &RunContext, index: &mut RouteIndex, identity: &str, files: &[PathBuf]) {
        for path in files {
            match RouteWriter::append(path, identity) {
                Ok(()) => {
                    index.record(identity, path);
                    info!(
                        run_id = %ctx.run_id(),
                        identity,
                        path = %path.display(),
                        "rollback: restored displaced entry"
                    );
                }
                Err(e) => error!(
                    run_id = %ctx.run_id(),
                    identity,
                    path = %path.display(),
                    error = %e,
                    "rollback failed, identity is no longer routed from this file"
                ),
            }
        }
    }
}
