//! Top-level error type for the audit relay domain.
//!
//! [`AuditError`] covers every condition that stops a single webhook request
//! from producing a log entry. Each variant carries the HTTP status the
//! transport layer answers with; the mapping lives here so that every
//! transport (HTTP today) reports the same status for the same failure.
//!
//! Sink failures are defined next to the sink port in [`crate::sink`]: they
//! happen after the request has been acknowledged and never reach the caller.

use thiserror::Error;

/// Body text of the 400 answer. Kept verbatim because Spinnaker operators grep
/// for it in echo's webhook failure logs.
pub const MALFORMED_ENVELOPE_MESSAGE: &str = "Spinnaker audit log request body is malformed.";

// ---------------------------------------------------------------------------
// Request-level errors
// ---------------------------------------------------------------------------

/// Errors that end the processing of one webhook request.
///
/// Authentication and envelope failures are controlled rejections. The
/// remaining variants describe payloads whose nested structure does not match
/// the event type they claim; they surface as server errors, exactly like an
/// unexpected exception would.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// The `authorization` header is missing, malformed, or carries the wrong
    /// username or password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The body is not JSON, `eventName` is not the Spinnaker sentinel, or
    /// `payload` is absent.
    #[error("{}", MALFORMED_ENVELOPE_MESSAGE)]
    MalformedEnvelope,

    /// A nested object required by the matched rule is absent
    /// (e.g. `content.execution` on an `orca:pipeline:starting` event).
    #[error("Missing required field '{path}'")]
    MissingField {
        /// Dotted path of the absent field, relative to `payload`.
        path: &'static str,
    },

    /// The payload is present but cannot be read into the event model
    /// (e.g. `content.standalone` is a string).
    #[error("Malformed payload: {message}")]
    MalformedPayload {
        /// Deserialiser description of the problem.
        message: String,
    },

    /// An epoch-millisecond timestamp is absent, not numeric, or out of range.
    #[error("Invalid timestamp at '{path}': {value}")]
    InvalidTimestamp {
        /// Dotted path of the timestamp field, relative to `payload`.
        path: &'static str,
        /// The raw value as received (`"<absent>"` when missing).
        value: String,
    },
}

impl AuditError {
    /// HTTP status code the transport answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuditError::InvalidCredentials => 401,
            AuditError::MalformedEnvelope => 400,
            AuditError::MissingField { .. }
            | AuditError::MalformedPayload { .. }
            | AuditError::InvalidTimestamp { .. } => 500,
        }
    }

    /// Returns `true` for rejections detected on purpose (401/400), which are
    /// reported at `warn` rather than `error`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuditError::InvalidCredentials | AuditError::MalformedEnvelope
        )
    }
}
