//! Audit log sink infrastructure adapters.
//!
//! Implements the [`audit::LogSink`] trait with two backends:
//!
//! - [`CloudLoggingSink`]: writes each entry to a named log stream through
//!   the Cloud Logging `entries:write` REST API, tagged with the `global`
//!   monitored resource of the configured project.
//! - [`ConsoleSink`]: emits each entry as a `tracing` event at the matching
//!   level.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, credential loading and wire formatting
//! live here. The [`audit`] crate sees only [`audit::LogSink`].

mod cloud_logging;
mod console;

pub use cloud_logging::{read_access_token, CloudLoggingConfig, CloudLoggingSink, DEFAULT_ENDPOINT};
pub use console::ConsoleSink;
