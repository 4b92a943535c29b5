//! Tree-wide uniqueness enforcement.
//!
//! 1. **Scanning** -- find every route file already holding an identity.
//! 2. **Resolution** -- refuse the assignment, or with override, strip the
//!    identity from every file where it was found.

pub mod resolver;
pub mod scanner;

pub use resolver::ConflictResolver;
pub use scanner::{Conflict, ConflictScanner};
