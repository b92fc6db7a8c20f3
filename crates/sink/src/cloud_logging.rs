//! Google Cloud Logging sink.
//!
//! Each entry is written with one `POST {endpoint}/v2/entries:write` call:
//!
//! ```json
//! { "logName": "projects/<project>/logs/<stream>",
//!   "resource": { "type": "global", "labels": { "project_id": "<project>" } },
//!   "entries": [ { "severity": "WARNING",
//!                  "jsonPayload": { "message": "...", "application": "...", "pipeline": "..." } } ] }
//! ```
//!
//! Authentication is a bearer access token read from the configured
//! credentials file on every write, so a token refreshed on disk (e.g. by a
//! metadata sidecar) is picked up without a restart. Without a credentials
//! file the request is sent unauthenticated, which is what the local logging
//! emulator expects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use audit::{LogEntry, LogSink, LogStreamName, ProjectId, Severity, SinkError};
use serde::Serialize;
use tracing::debug;

/// Production Cloud Logging API root.
pub const DEFAULT_ENDPOINT: &str = "https://logging.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where and as whom entries are written.
#[derive(Debug, Clone)]
pub struct CloudLoggingConfig {
    pub project_id: ProjectId,
    pub log_name: LogStreamName,
    /// API root, without trailing slash (e.g. [`DEFAULT_ENDPOINT`]).
    pub endpoint: String,
    /// File holding the OAuth2 bearer token; `None` sends unauthenticated
    /// requests.
    pub credentials_file: Option<PathBuf>,
}

/// Reads a bearer token from a credentials file (surrounding whitespace is
/// ignored).
pub async fn read_access_token(path: &Path) -> Result<String, SinkError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SinkError::Credentials {
            message: format!("cannot read '{}': {e}", path.display()),
        })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(SinkError::Credentials {
            message: format!("'{}' is empty", path.display()),
        });
    }
    Ok(token.to_string())
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteEntriesRequest<'a> {
    log_name: &'a str,
    resource: MonitoredResource<'a>,
    entries: [WireEntry<'a>; 1],
}

#[derive(Debug, Serialize)]
struct MonitoredResource<'a> {
    #[serde(rename = "type")]
    resource_type: &'static str,
    labels: ResourceLabels<'a>,
}

#[derive(Debug, Serialize)]
struct ResourceLabels<'a> {
    project_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry<'a> {
    severity: Severity,
    json_payload: JsonPayload<'a>,
}

#[derive(Debug, Serialize)]
struct JsonPayload<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    application: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Writes audit entries to one Cloud Logging log stream.
#[derive(Debug, Clone)]
pub struct CloudLoggingSink {
    client: reqwest::Client,
    url: String,
    log_name: String,
    project_id: ProjectId,
    credentials_file: Option<PathBuf>,
}

impl CloudLoggingSink {
    pub fn new(config: CloudLoggingConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: format!("{}/v2/entries:write", config.endpoint.trim_end_matches('/')),
            log_name: format!(
                "projects/{}/logs/{}",
                config.project_id, config.log_name
            ),
            project_id: config.project_id,
            credentials_file: config.credentials_file,
        })
    }

    /// Fully qualified log name entries are written to.
    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    fn request_body<'a>(&'a self, entry: &'a LogEntry) -> WriteEntriesRequest<'a> {
        WriteEntriesRequest {
            log_name: &self.log_name,
            resource: MonitoredResource {
                resource_type: "global",
                labels: ResourceLabels {
                    project_id: self.project_id.as_str(),
                },
            },
            entries: [WireEntry {
                severity: entry.severity,
                json_payload: JsonPayload {
                    message: &entry.message,
                    application: entry.application.as_ref().map(|a| a.as_str()),
                    pipeline: entry.pipeline.as_ref().map(|p| p.as_str()),
                },
            }],
        }
    }
}

#[async_trait]
impl LogSink for CloudLoggingSink {
    async fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.url).json(&self.request_body(entry));
        if let Some(path) = &self.credentials_file {
            request = request.bearer_auth(read_access_token(path).await?);
        }

        let response = request.send().await.map_err(|e| SinkError::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            log_name = %self.log_name,
            severity = %entry.severity,
            "Audit entry written to Cloud Logging"
        );
        Ok(())
    }
}
