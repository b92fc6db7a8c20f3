//! Transport-independent processing of one webhook request.
//!
//! [`AuditRelay::process`] runs the full per-request sequence:
//! authenticate → validate the envelope → classify. The transport layer only
//! has to hand over the `authorization` header and the raw body, answer with
//! the outcome, and dispatch the produced entry to a sink.

use tracing::debug;

use crate::auth::Credentials;
use crate::classify::Classifier;
use crate::event::Envelope;
use crate::{AuditError, LogEntry};

/// Result of a successfully processed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    /// The validated `eventName`, echoed in the acknowledgement.
    pub event_name: String,
    /// The entry to emit; `None` when no classification rule matched.
    pub entry: Option<LogEntry>,
}

impl Processed {
    /// Body of the success acknowledgement.
    pub fn acknowledgement(&self) -> String {
        format!("Success: {}", self.event_name)
    }
}

/// Immutable per-process request processor.
#[derive(Debug)]
pub struct AuditRelay {
    credentials: Credentials,
    classifier: Classifier,
}

impl AuditRelay {
    pub fn new(credentials: Credentials, classifier: Classifier) -> Self {
        Self {
            credentials,
            classifier,
        }
    }

    /// Processes one request.
    ///
    /// # Errors
    ///
    /// Propagates the first failure: [`AuditError::InvalidCredentials`],
    /// [`AuditError::MalformedEnvelope`], or any payload error raised while
    /// classifying. No entry is produced on error.
    pub fn process(&self, authorization: &str, body: &[u8]) -> Result<Processed, AuditError> {
        self.credentials.verify(authorization)?;

        let envelope = Envelope::from_slice(body)?;
        debug!(payload = ?envelope.payload, "Received Spinnaker event");

        let event = envelope.validate()?;
        let entry = self.classifier.classify(&event)?;

        Ok(Processed {
            event_name: event.event_name,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ZonedFormatter;
    use crate::Severity;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    fn relay() -> AuditRelay {
        AuditRelay::new(
            Credentials::new("echo", "s3cret").unwrap(),
            Classifier::new(ZonedFormatter::from_name("UTC").unwrap()),
        )
    }

    fn auth() -> String {
        format!("Basic {}", STANDARD.encode("echo:s3cret"))
    }

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn authentication_is_checked_before_the_body() {
        let err = relay().process("", b"not json").unwrap_err();
        assert_eq!(err, AuditError::InvalidCredentials);
    }

    #[test]
    fn wrong_event_name_is_rejected() {
        let err = relay()
            .process(&auth(), &body(json!({ "eventName": "other", "payload": {} })))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn unmatched_event_is_acknowledged_without_entry() {
        let processed = relay()
            .process(
                &auth(),
                &body(json!({
                    "eventName": "spinnaker_events",
                    "payload": { "details": { "source": "orca", "type": "unknown:event" }, "content": {} }
                })),
            )
            .unwrap();
        assert_eq!(processed.entry, None);
        assert_eq!(processed.acknowledgement(), "Success: spinnaker_events");
    }

    #[test]
    fn classified_event_yields_entry() {
        let processed = relay()
            .process(
                &auth(),
                &body(json!({
                    "eventName": "spinnaker_events",
                    "payload": {
                        "details": { "source": "orca", "type": "orca:pipeline:complete", "created": "0" },
                        "content": { "execution": { "name": "deploy", "application": "billing" } }
                    }
                })),
            )
            .unwrap();
        let entry = processed.entry.unwrap();
        assert_eq!(entry.severity, Severity::Info);
        assert!(entry.message.contains("Pipeline deploy of application billing completed"));
    }

    #[test]
    fn missing_details_is_a_server_error() {
        let err = relay()
            .process(
                &auth(),
                &body(json!({ "eventName": "spinnaker_events", "payload": { "content": {} } })),
            )
            .unwrap_err();
        assert_eq!(err, AuditError::MissingField { path: "details" });
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn unmatched_event_with_odd_containers_is_acknowledged() {
        let processed = relay()
            .process(
                &auth(),
                &body(json!({
                    "eventName": "spinnaker_events",
                    "payload": {
                        "details": { "source": "orca", "type": "unknown:event" },
                        "content": { "context": "free text", "execution": { "stages": null } }
                    }
                })),
            )
            .unwrap();
        assert_eq!(processed.entry, None);
    }

    #[test]
    fn completed_pipeline_with_null_stages_is_logged() {
        let processed = relay()
            .process(
                &auth(),
                &body(json!({
                    "eventName": "spinnaker_events",
                    "payload": {
                        "details": { "source": "orca", "type": "orca:pipeline:complete", "created": "0" },
                        "content": {
                            "execution": { "name": "deploy", "application": "billing", "stages": null }
                        }
                    }
                })),
            )
            .unwrap();
        let entry = processed.entry.unwrap();
        assert!(entry.message.contains("Pipeline deploy of application billing completed"));
    }
}
