//! The on-disk route table.
//!
//! Each backend owns a directory of `shadow_route_<tag>_<domain_base>` files
//! holding one identity per line. This module locates those files, indexes
//! their contents, appends and removes entries, and serializes access to a
//! tree for the duration of a run.

pub mod index;
pub mod locator;
pub mod lock;
pub mod tree;
pub mod writer;

pub use index::RouteIndex;
pub use locator::RouteFileLocator;
pub use lock::TreeLock;
pub use tree::RouteTree;
pub use writer::RouteWriter;
