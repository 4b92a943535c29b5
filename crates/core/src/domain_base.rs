//! Domain-base derivation.
//!
//! A domain base is the canonical key naming a route file. Each backend has
//! its own string-transform rule; the OTRS rule additionally consults a table
//! of literal exceptions before falling back to the transform.
//!
//! | Backend | `.co.` | `.com.` | trailing `.com` | `.` | `-` |
//! |---------|--------|---------|-----------------|-----|-----|
//! | Google  | → `.`  | kept    | stripped        | → `_` | → `_` |
//! | OTRS    | → `.`  | → `.`   | stripped        | → `_` | removed |

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::service::Service;

/// Built-in OTRS exceptions, kept as literal data. Configuration may add more.
pub const OTRS_EXCEPTIONS: &[(&str, &str)] = &[("hfm.com", "hfm_com")];

/// Canonical key derived from a mail domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainBase(String);

impl DomainBase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A backend-specific domain → domain-base transform.
///
/// Implementations must be pure: the same domain always yields the same base.
pub trait DomainBaseRule {
    fn derive(&self, domain: &str) -> DomainBase;
}

/// Google backend rule. Hyphens survive as underscores.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleRule;

impl DomainBaseRule for GoogleRule {
    fn derive(&self, domain: &str) -> DomainBase {
        let collapsed = domain.replace(".co.", ".");
        let trimmed = strip_com(&collapsed);
        DomainBase(trimmed.replace(['.', '-'], "_"))
    }
}

/// OTRS backend rule: exception table first, then the generic transform.
#[derive(Debug, Clone)]
pub struct OtrsRule {
    exceptions: BTreeMap<String, String>,
}

impl OtrsRule {
    /// Build the rule from the built-in table plus `extra` entries, which win
    /// on collision.
    pub fn new(extra: &BTreeMap<String, String>) -> Self {
        let mut exceptions: BTreeMap<String, String> = OTRS_EXCEPTIONS
            .iter()
            .map(|(domain, base)| (domain.to_string(), base.to_string()))
            .collect();
        for (domain, base) in extra {
            exceptions.insert(domain.to_ascii_lowercase(), base.clone());
        }
        Self { exceptions }
    }

    pub fn exceptions(&self) -> &BTreeMap<String, String> {
        &self.exceptions
    }
}

impl Default for OtrsRule {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl DomainBaseRule for OtrsRule {
    fn derive(&self, domain: &str) -> DomainBase {
        if let Some(base) = self.exceptions.get(domain) {
            debug!(domain, base = %base, "OTRS domain base from exception table");
            return DomainBase(base.clone());
        }

        let collapsed = domain.replace(".co.", ".").replace(".com.", ".");
        let trimmed = strip_com(&collapsed);
        DomainBase(trimmed.replace('.', "_").replace('-', ""))
    }
}

fn strip_com(domain: &str) -> &str {
    domain.strip_suffix(".com").unwrap_or(domain)
}

/// Selects the derivation rule for a [`Service`].
#[derive(Debug, Clone, Default)]
pub struct DomainBaseResolver {
    google: GoogleRule,
    otrs: OtrsRule,
}

impl DomainBaseResolver {
    pub fn new(otrs_exceptions: &BTreeMap<String, String>) -> Self {
        Self {
            google: GoogleRule,
            otrs: OtrsRule::new(otrs_exceptions),
        }
    }

    pub fn rule(&self, service: Service) -> &dyn DomainBaseRule {
        match service {
            Service::Google => &self.google,
            Service::Otrs => &self.otrs,
        }
    }

    /// Derive the domain base for `domain` under `service`.
    ///
    /// The domain is compared case-insensitively.
    pub fn resolve(&self, service: Service, domain: &str) -> DomainBase {
        let domain = domain.trim().to_ascii_lowercase();
        self.rule(service).derive(&domain)
    }
}
