//! Spinnaker webhook receiver.
//!
//! Binds an HTTP server that Spinnaker's echo service posts events to. Every
//! request is handled independently:
//!
//! 1. The `authorization` header and raw body are handed to
//!    [`audit::AuditRelay::process`].
//! 2. Errors are answered with the status carried by [`audit::AuditError`].
//! 3. On success the request is acknowledged immediately and the produced
//!    entry, if any, is written to the configured [`audit::LogSink`] by a
//!    detached task ([`dispatch`]).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Routing, header extraction, response mapping and task
//! spawning live here. The [`audit`] crate never sees HTTP types.

mod dispatch;
mod server;

pub use dispatch::dispatch;
pub use server::{router, serve, ListenerState};
