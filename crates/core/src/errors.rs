//! Error types for the shadow-route core library.
//!
//! Per-address failures are [`RouteError`]s: the batch orchestrator records
//! them against the offending address and keeps going. Everything else is a
//! run-level failure that aborts before the first address is processed, and
//! is unified under [`CoreError`].

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified run-level error type for the core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// The backend output directory does not exist.
    #[error("route tree not found at '{}'", .0.display())]
    TreeMissing(PathBuf),
}

// ---------------------------------------------------------------------------
// Per-address errors
// ---------------------------------------------------------------------------

/// Reasons a single address could not be assigned.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The address does not look like `local@domain.tld`.
    #[error("invalid email address format: '{0}'")]
    InvalidFormat(String),

    /// The backend selector is not one of the known services.
    #[error("unknown service '{0}' (expected 'google' or 'otrs')")]
    UnknownService(String),

    /// The target route file has not been provisioned.
    #[error("route file missing: '{}'", .path.display())]
    RouteFileMissing { path: PathBuf },

    /// The identity is already routed and override was not requested.
    #[error("identity '{identity}' already present in {}", display_paths(.files))]
    IdentityConflict {
        identity: String,
        files: Vec<PathBuf>,
    },

    /// Appending to or rewriting a route file failed.
    #[error("failed to write route file '{}': {source}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RouteError {
    /// Short machine-friendly label, used in logs and the terminal summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "InvalidFormat",
            Self::UnknownService(_) => "UnknownService",
            Self::RouteFileMissing { .. } => "RouteFileMissing",
            Self::IdentityConflict { .. } => "IdentityConflict",
            Self::WriteError { .. } => "WriteError",
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tree lock errors
// ---------------------------------------------------------------------------

/// Errors acquiring the per-tree exclusive lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another live process holds the lock.
    #[error("route tree is locked by PID {pid} ('{}')", .path.display())]
    Held { path: PathBuf, pid: u32 },

    /// Another process has just created the lock and not yet written its PID,
    /// or keeps winning the takeover race.
    #[error("route tree lock '{}' is being acquired by another process", .path.display())]
    Busy { path: PathBuf },

    /// The lock file exists but does not contain a PID.
    #[error("lock file '{}' is unreadable: {detail}", .path.display())]
    Corrupt { path: PathBuf, detail: String },

    /// Creating, reading, or removing the lock file failed.
    #[error("lock I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Index errors
// ---------------------------------------------------------------------------

/// Errors while scanning the output tree to build the route index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A directory or route file could not be read.
    #[error("failed to scan '{}': {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RouteError::InvalidFormat("not-an-email".into());
        assert_eq!(
            err.to_string(),
            "invalid email address format: 'not-an-email'"
        );

        let err = RouteError::RouteFileMissing {
            path: PathBuf::from("/srv/shadow_route_google_example"),
        };
        assert_eq!(
            err.to_string(),
            "route file missing: '/srv/shadow_route_google_example'"
        );

        let err = RouteError::IdentityConflict {
            identity: "jdoe".into(),
            files: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        assert_eq!(
            err.to_string(),
            "identity 'jdoe' already present in '/a', '/b'"
        );

        let err = LockError::Held {
            path: PathBuf::from("/srv/.shadowroute.lock"),
            pid: 4242,
        };
        assert!(err.to_string().contains("4242"));
    }

    #[test]
    fn test_route_error_kinds() {
        assert_eq!(RouteError::UnknownService("x".into()).kind(), "UnknownService");
        let err = RouteError::WriteError {
            path: PathBuf::from("/x"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.kind(), "WriteError");
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let err = ConfigError::FileNotFound("/etc/x.toml".into());
        let core_err: CoreError = err.into();
        assert!(matches!(core_err, CoreError::Config(_)));

        let err = LockError::Held {
            path: PathBuf::from("/l"),
            pid: 1,
        };
        let core_err: CoreError = err.into();
        assert!(matches!(core_err, CoreError::Lock(_)));
    }
}
