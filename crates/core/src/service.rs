//! Mail-routing backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RouteError;

/// A routing backend that consumes shadow route files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Google Workspace mail routing.
    Google,
    /// OTRS ticketing mail routing.
    Otrs,
}

impl Service {
    /// Every known backend.
    pub const ALL: [Service; 2] = [Service::Google, Service::Otrs];

    /// Tag used in route file names (`shadow_route_<tag>_<domain_base>`).
    pub fn tag(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Otrs => "otrs",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => write!(f, "Google"),
            Self::Otrs => write!(f, "OTRS"),
        }
    }
}

impl FromStr for Service {
    type Err = RouteError;

    /// Case-insensitive: `Google`, `google`, `OTRS`, `otrs`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.trim();
        Self::ALL
            .into_iter()
            .find(|service| service.tag().eq_ignore_ascii_case(selector))
            .ok_or_else(|| RouteError::UnknownService(s.to_string()))
    }
}
