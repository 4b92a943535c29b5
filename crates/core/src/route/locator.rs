//! Route file path construction.

use std::path::{Path, PathBuf};

use crate::domain_base::DomainBase;
use crate::service::Service;

/// File name prefix shared by every shadow route file.
pub const ROUTE_FILE_PREFIX: &str = "shadow_route_";

/// Maps (service, domain base) to a route file under one output directory.
///
/// Never touches the filesystem; whether the file exists is the caller's
/// concern.
#[derive(Debug, Clone)]
pub struct RouteFileLocator {
    root: PathBuf,
}

impl RouteFileLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `shadow_route_<tag>_<domain_base>`
    pub fn file_name(service: Service, base: &DomainBase) -> String {
        format!("{}{}_{}", ROUTE_FILE_PREFIX, service.tag(), base)
    }

    pub fn locate(&self, service: Service, base: &DomainBase) -> PathBuf {
        self.root.join(Self::file_name(service, base))
    }

    /// Whether `name` follows the shadow route naming convention.
    pub fn is_route_file_name(name: &str) -> bool {
        name.len() > ROUTE_FILE_PREFIX.len() && name.starts_with(ROUTE_FILE_PREFIX)
    }
}
