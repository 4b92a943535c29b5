//! Shadow-route assignment core library.
//!
//! Assigns mail-routing identities (the local part of an address) to
//! backend-specific `shadow_route_<tag>_<domain_base>` files while keeping
//! every identity unique across a backend's route tree: validation,
//! domain-base derivation, route file location, conflict scanning and
//! resolution, appends, and batch orchestration.

pub mod batch;
pub mod config;
pub mod conflict;
pub mod context;
pub mod domain_base;
pub mod errors;
pub mod identity;
pub mod route;
pub mod service;

// Re-exports for convenience.
pub use batch::{BatchOrchestrator, BatchResult};
pub use config::AppConfig;
pub use context::RunContext;
pub use domain_base::{DomainBase, DomainBaseResolver};
pub use errors::{CoreError, RouteError};
pub use service::Service;
