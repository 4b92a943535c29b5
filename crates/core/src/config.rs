//! TOML-based configuration for shadow-route assignment.
//!
//! ```toml
//! [log]
//! level = "info"
//! file = "/var/log/shadowroute/shadowroute.log"
//!
//! [routes]
//! lock = true
//!
//! [google]
//! output_dir = "/srv/mail/shadow/google"
//!
//! [otrs]
//! output_dir = "/srv/mail/shadow/otrs"
//!
//! [otrs.exceptions]
//! "hfm.com" = "hfm_com"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::service::Service;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log stream settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Route tree behaviour shared by all backends.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Google backend route tree.
    pub google: BackendConfig,

    /// OTRS backend route tree and domain exceptions.
    pub otrs: OtrsConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level or filter directive (e.g. `info`, `debug`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional file the run's log lines are appended to, in addition to
    /// stderr. Rotation is left to the host.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Settings applied to every backend's route tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    /// Hold an exclusive lock file in the output directory for the run.
    #[serde(default = "default_true")]
    pub lock: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self { lock: true }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// A backend's route tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Directory holding the backend's `shadow_route_*` files.
    pub output_dir: PathBuf,
}

/// The OTRS backend: a route tree plus literal domain exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtrsConfig {
    /// Directory holding the OTRS `shadow_route_otrs_*` files.
    pub output_dir: PathBuf,

    /// Literal domain → domain-base mappings consulted before the generic
    /// OTRS transform. Extends the built-in table.
    #[serde(default)]
    pub exceptions: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.level".into(),
                detail: "log level must not be empty".into(),
            });
        }
        if self.google.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "google.output_dir".into(),
                detail: "output directory must not be empty".into(),
            });
        }
        if self.otrs.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "otrs.output_dir".into(),
                detail: "output directory must not be empty".into(),
            });
        }
        for (domain, base) in &self.otrs.exceptions {
            if domain.trim().is_empty() || !domain.contains('.') {
                return Err(ConfigError::InvalidValue {
                    field: "otrs.exceptions".into(),
                    detail: format!("'{}' is not a domain", domain),
                });
            }
            if base.is_empty() || base.contains(['/', '\\']) || base.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    field: format!("otrs.exceptions.\"{}\"", domain),
                    detail: format!("'{}' is not a usable domain base", base),
                });
            }
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Route tree root for `service`.
    pub fn output_dir(&self, service: Service) -> &Path {
        match service {
            Service::Google => &self.google.output_dir,
            Service::Otrs => &self.otrs.output_dir,
        }
    }

    /// Replace the route tree root for `service` (e.g. from a CLI flag).
    pub fn set_output_dir(&mut self, service: Service, dir: PathBuf) {
        match service {
            Service::Google => self.google.output_dir = dir,
            Service::Otrs => self.otrs.output_dir = dir,
        }
    }
}

/// Starter configuration written by `shadowroute init`.
pub const DEFAULT_CONFIG: &str = r#"# Shadow-route assignment configuration.

[log]
level = "info"
# file = "/var/log/shadowroute/shadowroute.log"

[routes]
# Hold .shadowroute.lock in the output directory while a batch runs.
lock = true

[google]
output_dir = "/srv/mail/shadow/google"

[otrs]
output_dir = "/srv/mail/shadow/otrs"

# Literal domain -> domain-base mappings checked before the generic OTRS rule.
[otrs.exceptions]
"hfm.com" = "hfm_com"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[log]
level = "debug"
file = "/tmp/shadowroute.log"

[routes]
lock = false

[google]
output_dir = "/srv/shadow/google"

[otrs]
output_dir = "/srv/shadow/otrs"

[otrs.exceptions]
"partner.co.uk" = "partner_couk"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.file, Some(PathBuf::from("/tmp/shadowroute.log")));
        assert!(!config.routes.lock);
        assert_eq!(config.output_dir(Service::Google), Path::new("/srv/shadow/google"));
        assert_eq!(config.output_dir(Service::Otrs), Path::new("/srv/shadow/otrs"));
        assert_eq!(config.otrs.exceptions["partner.co.uk"], "partner_couk");
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[google]
output_dir = "/g"
[otrs]
output_dir = "/o"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.log.level, "info");
        assert!(config.log.file.is_none());
        assert!(config.routes.lock);
        assert!(config.otrs.exceptions.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_default_config_template_is_valid() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.otrs.exceptions["hfm.com"], "hfm_com");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/shadowroute.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[google]\noutput_dir = 42\n").unwrap();
        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_output_dir() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.google.output_dir = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "google.output_dir"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_exception() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config
            .otrs
            .exceptions
            .insert("evil.com".into(), "../etc/passwd".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_set_output_dir() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.set_output_dir(Service::Otrs, PathBuf::from("/override"));
        assert_eq!(config.output_dir(Service::Otrs), Path::new("/override"));
        assert_eq!(config.output_dir(Service::Google), Path::new("/srv/shadow/google"));
    }
}
