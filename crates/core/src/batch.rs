//! Batch orchestration.
//!
//! Splits a comma-separated address list and drives each address through
//! validation → domain base → route file → conflict check → append. Every
//! address is handled independently: a failure is recorded against that
//! address and the batch moves on.

use std::path::PathBuf;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::ConflictResolver;
use crate::config::AppConfig;
use crate::context::RunContext;
use crate::domain_base::{DomainBase, DomainBaseResolver};
use crate::errors::{CoreError, RouteError};
use crate::identity;
use crate::route::{RouteTree, RouteWriter};
use crate::service::Service;

/// Separator between addresses in a batch list.
pub const ADDRESS_DELIMITER: char = ',';

/// Split a raw list into trimmed, non-empty address fragments.
pub fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(ADDRESS_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A successfully written identity.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The address as supplied by the caller.
    pub address: String,
    pub identity: String,
    pub domain_base: DomainBase,
    pub route_file: PathBuf,
    /// Files the identity was removed from under override.
    pub displaced_from: Vec<PathBuf>,
}

/// An address that could not be assigned, with the reason.
#[derive(Debug)]
pub struct FailedAddress {
    pub address: String,
    pub error: RouteError,
}

/// Aggregate outcome of one batch.
#[derive(Debug)]
pub struct BatchResult {
    pub run_id: Uuid,
    /// `None` when the selector did not name a known backend.
    pub service: Option<Service>,
    pub succeeded: Vec<Assignment>,
    pub failed: Vec<FailedAddress>,
}

impl BatchResult {
    fn new(run_id: Uuid, service: Option<Service>) -> Self {
        Self {
            run_id,
            service,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// `true` only when no address failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives a batch of addresses against one backend's route tree.
pub struct BatchOrchestrator<'a> {
    ctx: &'a RunContext,
    config: &'a AppConfig,
    resolver: DomainBaseResolver,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(ctx: &'a RunContext, config: &'a AppConfig) -> Self {
        Self {
            ctx,
            config,
            resolver: DomainBaseResolver::new(&config.otrs.exceptions),
        }
    }

    /// Run a batch.
    ///
    /// `Err` is reserved for run prerequisites (missing tree, held lock,
    /// unreadable tree) and means no address was processed. Per-address
    /// failures, including an unknown `selector`, land in
    /// [`BatchResult::failed`].
    pub fn run(&self, raw_list: &str, selector: &str, force: bool) -> Result<BatchResult, CoreError> {
        let _entered = self.ctx.span().enter();
        let addresses = split_addresses(raw_list);
        info!(
            run_id = %self.ctx.run_id(),
            selector,
            force,
            addresses = addresses.len(),
            "starting shadow route batch"
        );

        let service = match selector.parse::<Service>() {
            Ok(service) => service,
            Err(_) => {
                warn!(selector, "unknown service selector, failing every address");
                let mut result = BatchResult::new(self.ctx.run_id(), None);
                for address in addresses {
                    result.failed.push(FailedAddress {
                        address,
                        error: RouteError::UnknownService(selector.to_string()),
                    });
                }
                return Ok(result);
            }
        };

        let mut result = BatchResult::new(self.ctx.run_id(), Some(service));
        if addresses.is_empty() {
            warn!("empty address list, nothing to do");
            return Ok(result);
        }

        let root = self.config.output_dir(service);
        let mut tree = RouteTree::open(root, self.config.routes.lock)?;

        for address in addresses {
            match self.assign_one(&mut tree, service, &address, force) {
                Ok(assignment) => {
                    info!(
                        address = %assignment.address,
                        route_file = %assignment.route_file.display(),
                        displaced = assignment.displaced_from.len(),
                        "identity assigned"
                    );
                    result.succeeded.push(assignment);
                }
                Err(error) => {
                    warn!(address = %address, kind = error.kind(), error = %error, "address failed");
                    result.failed.push(FailedAddress { address, error });
                }
            }
        }

        info!(
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            elapsed_ms = self.ctx.elapsed().num_milliseconds(),
            "shadow route batch complete"
        );
        Ok(result)
    }

    /// Validate, locate, clear, and append a single address.
    fn assign_one(
        &self,
        tree: &mut RouteTree,
        service: Service,
        address: &str,
        force: bool,
    ) -> Result<Assignment, RouteError> {
        let email = identity::validate(address)?;
        let domain_base = self.resolver.resolve(service, email.domain());
        let route_file = tree.locate(service, &domain_base);
        debug!(
            identity = email.identity(),
            domain = email.domain(),
            domain_base = %domain_base,
            route_file = %route_file.display(),
            "resolved route file"
        );

        RouteWriter::ensure_writable(&route_file)?;

        let displaced_from =
            ConflictResolver::clear(self.ctx, tree.index_mut(), email.identity(), force)?;

        if let Err(e) = RouteWriter::append(&route_file, email.identity()) {
            ConflictResolver::restore(
                self.ctx,
                tree.index_mut(),
                email.identity(),
                &displaced_from,
            );
            return Err(e);
        }
        tree.index_mut().record(email.identity(), &route_file);

        Ok(Assignment {
            address: address.to_string(),
            identity: email.identity().to_string(),
            domain_base,
            route_file,
            displaced_from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn config_for(root: &Path) -> AppConfig {
        let toml = format!(
            r#"
[routes]
lock = true
[google]
output_dir = '{root}'
[otrs]
output_dir = '{root}'
"#,
            root = root.display()
        );
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn test_split_addresses() {
        assert_eq!(
            split_addresses(" a@x.com, b@y.com ,,c@z.org ,"),
            vec!["a@x.com", "b@y.com", "c@z.org"]
        );
        assert!(split_addresses("  , ").is_empty());
    }

    #[test]
    fn test_single_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("shadow_route_google_example");
        fs::write(&file, "").unwrap();
        let config = config_for(dir.path());
        let ctx = RunContext::new();

        let result = BatchOrchestrator::new(&ctx, &config)
            .run("jdoe@example.com", "Google", false)
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.service, Some(Service::Google));
        assert_eq!(result.succeeded[0].route_file, file);
        assert_eq!(result.succeeded[0].domain_base.as_str(), "example");
        assert_eq!(fs::read_to_string(&file).unwrap(), "jdoe\n");
    }

    #[test]
    fn test_unknown_service_fails_every_address() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let ctx = RunContext::new();

        let result = BatchOrchestrator::new(&ctx, &config)
            .run("a@example.com,b@example.com", "exchange", false)
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.service, None);
        assert_eq!(result.failed_count(), 2);
        assert!(result
            .failed
            .iter()
            .all(|f| matches!(f.error, RouteError::UnknownService(_))));
    }

    #[test]
    fn test_duplicate_within_batch_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shadow_route_otrs_example"), "").unwrap();
        fs::write(dir.path().join("shadow_route_otrs_hfm_com"), "").unwrap();
        let config = config_for(dir.path());
        let ctx = RunContext::new();

        let result = BatchOrchestrator::new(&ctx, &config)
            .run("jdoe@example.com, JDoe@hfm.com", "otrs", false)
            .unwrap();

        assert_eq!(result.succeeded_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.failed[0].address, "JDoe@hfm.com");
        assert!(matches!(
            result.failed[0].error,
            RouteError::IdentityConflict { .. }
        ));
    }

    #[test]
    fn test_missing_tree_aborts_before_processing() {
        let config = config_for(Path::new("/nonexistent/route/tree"));
        let ctx = RunContext::new();

        let result = BatchOrchestrator::new(&ctx, &config).run("jdoe@example.com", "google", false);
        assert!(matches!(result, Err(CoreError::TreeMissing(_))));
    }

    #[test]
    fn test_held_lock_aborts_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("shadow_route_google_example");
        fs::write(&file, "").unwrap();
        let _held = crate::route::TreeLock::acquire(dir.path()).unwrap();
        let config = config_for(dir.path());
        let ctx = RunContext::new();

        let result = BatchOrchestrator::new(&ctx, &config).run("jdoe@example.com", "google", false);
        assert!(matches!(result, Err(CoreError::Lock(_))));
        assert_eq!(fs::read_to_string(&file).unwrap(), "");
    }
}
