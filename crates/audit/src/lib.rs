//! Core domain for the Spinnaker audit log relay.
//!
//! This crate contains the inbound event model, webhook authentication, the
//! event classification rules, and the port traits that infrastructure crates
//! implement. It performs no I/O.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate defines *what* an audit
//! entry is and when one is produced; the `sink` crate defines *where* entries
//! go and the `listener` crate defines *how* events arrive.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ApplicationName`, `RequestId`, etc.) |
//! | [`types`] | Shared value types (`LogEntry`, `Severity`, `EpochMillis`) |
//! | [`errors`] | Request-level error type with HTTP status mapping |
//! | [`event`] | Spinnaker envelope and payload model |
//! | [`auth`] | Basic credential verification |
//! | [`time`] | Timestamp rendering port and timezone implementation |
//! | [`classify`] | Ordered rule table and message templates |
//! | [`relay`] | Per-request processing sequence |
//! | [`sink`] | Log sink port |

pub mod auth;
pub mod classify;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod relay;
pub mod sink;
pub mod time;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use auth::Credentials;
pub use classify::{Classifier, EventKind};
pub use errors::{AuditError, MALFORMED_ENVELOPE_MESSAGE};
pub use event::{Envelope, SpinnakerEvent, SPINNAKER_EVENT_NAME};
pub use identifiers::{ApplicationName, LogStreamName, PipelineName, ProjectId, RequestId};
pub use relay::{AuditRelay, Processed};
pub use sink::{LogSink, SinkError};
pub use time::{TimestampFormatter, ZonedFormatter};
pub use types::{EpochMillis, LogEntry, Severity};
