//! Newtype domain identifiers.
//!
//! Every name that travels from an inbound event to an outbound log entry, or
//! from configuration to the logging backend, is a distinct newtype wrapping a
//! `String`. This prevents accidentally interchanging, for example, an
//! [`ApplicationName`] with a [`PipelineName`] even though both are plain
//! strings on the wire.

use serde::Serialize;
use uuid::Uuid;

// Non-empty names. An empty value from an event or the configuration never
// becomes an identifier, so blank attributes and blank log names cannot be
// constructed.
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps `value`; `None` when it is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let value = value.into();
                (!value.is_empty()).then_some(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single inbound webhook request.
///
/// Generated fresh for every request; recorded on the request span so the
/// classification, the dispatch task and any sink failure can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (event attributes)
// ---------------------------------------------------------------------------

string_id! {
    /// A Spinnaker application name (`execution.application`).
    ApplicationName
}

string_id! {
    /// A Spinnaker pipeline name (`execution.name`).
    PipelineName
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (logging backend)
// ---------------------------------------------------------------------------

string_id! {
    /// The logging backend project that owns the audit log stream.
    ProjectId
}

string_id! {
    /// The name of the log stream audit entries are written to
    /// (e.g. `"spinnaker-audit"`).
    LogStreamName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_reject_empty_values() {
        assert!(ApplicationName::new("").is_none());
        assert!(PipelineName::new(String::new()).is_none());
        assert_eq!(
            ProjectId::new("audit-prod").map(|p| p.to_string()),
            Some("audit-prod".to_string())
        );
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new_random(), RequestId::new_random());
    }
}
