//! The log sink port.
//!
//! A [`LogSink`] delivers classified [`LogEntry`] values to a logging backend.
//! Implementations live in the `sink` crate; this crate only defines what is
//! needed.

use async_trait::async_trait;
use thiserror::Error;

use crate::LogEntry;

/// Errors raised while delivering an entry to a logging backend.
///
/// These never reach the webhook caller: delivery happens after the request
/// has been acknowledged.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend answered with a non-success status.
    #[error("Log backend rejected the entry with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the backend.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The backend could not be reached or the exchange failed mid-way.
    #[error("Log backend request failed: {message}")]
    Transport {
        /// Transport-level description of the failure.
        message: String,
    },

    /// The credentials needed to talk to the backend could not be obtained.
    #[error("Log backend credentials unavailable: {message}")]
    Credentials {
        /// Description of the credential problem.
        message: String,
    },
}

/// Destination for audit log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Writes one entry. Called once per classified event, never retried.
    async fn write(&self, entry: &LogEntry) -> Result<(), SinkError>;
}
