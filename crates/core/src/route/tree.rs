//! An opened route tree: locator, index, and (optionally) the tree lock.

use std::path::{Path, PathBuf};

use tracing::info;

use super::index::RouteIndex;
use super::locator::RouteFileLocator;
use super::lock::TreeLock;
use crate::domain_base::DomainBase;
use crate::errors::CoreError;
use crate::service::Service;

/// One backend's route tree, ready for conflict checks and writes.
///
/// Holding a `RouteTree` opened with `lock = true` keeps the tree lock for
/// as long as the value lives.
#[derive(Debug)]
pub struct RouteTree {
    locator: RouteFileLocator,
    index: RouteIndex,
    lock: Option<TreeLock>,
}

impl RouteTree {
    /// Open the tree at `root`, taking the lock first when `lock` is set so
    /// the index is built from a tree nobody else is writing.
    pub fn open(root: &Path, lock: bool) -> Result<Self, CoreError> {
        if !root.is_dir() {
            return Err(CoreError::TreeMissing(root.to_path_buf()));
        }

        let lock = if lock {
            Some(TreeLock::acquire(root)?)
        } else {
            info!(root = %root.display(), "route tree lock disabled");
            None
        };

        let index = RouteIndex::build(root)?;
        Ok(Self {
            locator: RouteFileLocator::new(root),
            index,
            lock,
        })
    }

    pub fn root(&self) -> &Path {
        self.locator.root()
    }

    pub fn locate(&self, service: Service, base: &DomainBase) -> PathBuf {
        self.locator.locate(service, base)
    }

    pub fn index(&self) -> &RouteIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut RouteIndex {
        &mut self.index
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}
