//! Email address validation.
//!
//! Accepted shape: `local-part@label(.label)+`, where the final label is at
//! least two ASCII letters.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::errors::RouteError;

const EMAIL_PATTERN: &str =
    r"^([A-Za-z0-9._%+-]+)@((?:[A-Za-z0-9-]+\.)+[A-Za-z]{2,})$";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("EMAIL_PATTERN is a valid regex"))
}

/// A validated address split into its routing parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    identity: String,
    domain: String,
}

impl EmailAddress {
    /// The local part, exactly as written by the caller.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The domain part, lower-cased.
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity, self.domain)
    }
}

/// Validate a raw address and split it into identity and domain.
///
/// Surrounding whitespace is not stripped here; the batch splitter does that.
pub fn validate(raw: &str) -> Result<EmailAddress, RouteError> {
    let caps = email_regex()
        .captures(raw)
        .ok_or_else(|| RouteError::InvalidFormat(raw.to_string()))?;

    match (caps.get(1), caps.get(2)) {
        (Some(local), Some(domain)) => Ok(EmailAddress {
            identity: local.as_str().to_string(),
            domain: domain.as_str().to_ascii_lowercase(),
        }),
        _ => Err(RouteError::InvalidFormat(raw.to_string())),
    }
}
