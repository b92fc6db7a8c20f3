//! Relay configuration.
//!
//! Loaded once at startup from a JSON file, with secrets optionally supplied
//! through the environment:
//!
//! ```json
//! {
//!   "username": "echo",
//!   "password": "change-me",
//!   "timezone": "America/Los_Angeles",
//!   "listen": "0.0.0.0:8080",
//!   "backend": {
//!     "project_id": "audit-prod",
//!     "log_name": "spinnaker-audit",
//!     "credentials_file": "/var/run/secrets/logging-token"
//!   }
//! }
//! ```
//!
//! Without `backend`, entries go to the console sink.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use audit::{Credentials, LogStreamName, ProjectId, ZonedFormatter};
use serde::Deserialize;
use thiserror::Error;

/// Overrides `username` from the file.
pub const USERNAME_ENV: &str = "AUDIT_RELAY_USERNAME";
/// Overrides `password` from the file.
pub const PASSWORD_ENV: &str = "AUDIT_RELAY_PASSWORD";

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_LOG_NAME: &str = "spinnaker-audit";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub timezone: String,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub backend: Option<RawBackend>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBackend {
    pub project_id: String,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// Logging backend settings, validated.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub project_id: ProjectId,
    pub log_name: LogStreamName,
    pub credentials_file: Option<PathBuf>,
    pub endpoint: String,
}

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub credentials: Credentials,
    pub formatter: ZonedFormatter,
    pub listen: SocketAddr,
    pub backend: Option<BackendConfig>,
}

/// Environment values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EnvOverrides {
    pub fn from_process_env() -> Self {
        Self {
            username: std::env::var(USERNAME_ENV).ok(),
            password: std::env::var(PASSWORD_ENV).ok(),
        }
    }
}

impl RelayConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(
        path: &Path,
        overrides: EnvOverrides,
        listen_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw, overrides, listen_override)
    }

    /// Validates an already parsed configuration.
    pub fn from_raw(
        raw: RawConfig,
        overrides: EnvOverrides,
        listen_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let username = overrides.username.or(raw.username).unwrap_or_default();
        let password = overrides.password.or(raw.password).unwrap_or_default();
        let credentials = Credentials::new(username, password)
            .ok_or_else(|| invalid("username and password must both be set and non-empty"))?;

        let formatter = ZonedFormatter::from_name(&raw.timezone)
            .ok_or_else(|| invalid(format!("unknown timezone '{}'", raw.timezone)))?;

        let listen = match listen_override {
            Some(addr) => addr,
            None => {
                let text = raw.listen.as_deref().unwrap_or(DEFAULT_LISTEN);
                text.parse()
                    .map_err(|_| invalid(format!("invalid listen address '{text}'")))?
            }
        };

        let backend = raw.backend.map(BackendConfig::from_raw).transpose()?;

        Ok(Self {
            credentials,
            formatter,
            listen,
            backend,
        })
    }
}

impl BackendConfig {
    fn from_raw(raw: RawBackend) -> Result<Self, ConfigError> {
        let project_id = ProjectId::new(raw.project_id)
            .ok_or_else(|| invalid("backend.project_id must not be empty"))?;
        let log_name = LogStreamName::new(raw.log_name.unwrap_or_else(|| DEFAULT_LOG_NAME.into()))
            .ok_or_else(|| invalid("backend.log_name must not be empty"))?;
        Ok(Self {
            project_id,
            log_name,
            credentials_file: raw.credentials_file,
            endpoint: raw
                .endpoint
                .unwrap_or_else(|| sink::DEFAULT_ENDPOINT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(value: serde_json::Value) -> RawConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let config = RelayConfig::from_raw(
            raw(serde_json::json!({ "username": "echo", "password": "pw", "timezone": "UTC" })),
            EnvOverrides::default(),
            None,
        )
        .unwrap();
        assert_eq!(config.credentials.username(), "echo");
        assert_eq!(config.listen, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert!(config.backend.is_none());
    }

    #[test]
    fn backend_defaults_log_name_and_endpoint() {
        let config = RelayConfig::from_raw(
            raw(serde_json::json!({
                "username": "echo", "password": "pw", "timezone": "Europe/Berlin",
                "backend": { "project_id": "audit-prod" }
            })),
            EnvOverrides::default(),
            None,
        )
        .unwrap();
        let backend = config.backend.unwrap();
        assert_eq!(backend.log_name.as_str(), "spinnaker-audit");
        assert_eq!(backend.endpoint, "https://logging.googleapis.com");
        assert_eq!(backend.credentials_file, None);
    }

    #[test]
    fn environment_overrides_file_credentials() {
        let config = RelayConfig::from_raw(
            raw(serde_json::json!({ "timezone": "UTC" })),
            EnvOverrides {
                username: Some("from-env".into()),
                password: Some("secret".into()),
            },
            Some("127.0.0.1:9000".parse().unwrap()),
        )
        .unwrap();
        assert_eq!(config.credentials.username(), "from-env");
        assert_eq!(config.listen.port(), 9000);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            serde_json::json!({ "username": "echo", "timezone": "UTC" }),
            serde_json::json!({ "username": "echo", "password": "pw", "timezone": "Nowhere/City" }),
            serde_json::json!({ "username": "echo", "password": "pw", "timezone": "UTC", "listen": "port 80" }),
            serde_json::json!({ "username": "echo", "password": "pw", "timezone": "UTC", "backend": { "project_id": "" } }),
        ];
        for case in cases {
            let err = RelayConfig::from_raw(raw(case.clone()), EnvOverrides::default(), None)
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{case}");
        }
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let path = std::env::temp_dir().join(format!("audit-relay-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "timezone": "UTC", "passwrd": "typo" }"#).unwrap();
        let err = RelayConfig::load(&path, EnvOverrides::default(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = RelayConfig::load(
            Path::new("/nonexistent/relay.json"),
            EnvOverrides::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
