//! Shared value types for the audit relay domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (a log entry always has a message, a
//! timestamp is a valid instant) and are what the classifier produces and the
//! sinks consume.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{ApplicationName, PipelineName};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Importance level attached to an emitted [`LogEntry`].
///
/// Serialised in upper case (`"INFO"`, `"WARNING"`, ...), which is the form
/// the logging backend expects in its `severity` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Routine activity: builds, pushes, starts and completions.
    #[default]
    Info,
    /// Human intervention that stopped work (cancellations, stop judgments).
    Warning,
    /// Failures: failed builds, failed pipelines, failed tasks.
    Error,
    /// Diagnostic detail. Not produced by any classification rule today.
    Debug,
}

impl Severity {
    /// Returns the upper-case wire name of the severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Debug => "DEBUG",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// One audit record, produced fresh per classified event and handed straight
/// to a [`crate::LogSink`]. Never persisted by the relay itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Human-readable audit message. Always non-empty.
    pub message: String,

    /// Importance of the entry.
    pub severity: Severity,

    /// Application the event belongs to, when the matched rule attaches
    /// execution attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationName>,

    /// Pipeline the event belongs to, when the matched rule attaches
    /// execution attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineName>,
}

impl LogEntry {
    /// Creates an entry without structured attributes.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            application: None,
            pipeline: None,
        }
    }

    /// Attaches the application/pipeline attributes. Empty names are dropped.
    pub fn with_attributes(
        mut self,
        application: Option<&str>,
        pipeline: Option<&str>,
    ) -> Self {
        self.application = application.and_then(ApplicationName::new);
        self.pipeline = pipeline.and_then(PipelineName::new);
        self
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch, as carried by Spinnaker event details
/// and Jenkins build records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochMillis(i64);

impl EpochMillis {
    /// Creates an [`EpochMillis`] from a raw millisecond count.
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Parses the textual form used on the wire (`"1700000000000"`).
    ///
    /// Fractional values are truncated toward zero. Returns `None` for
    /// non-numeric or non-finite input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(millis) = trimmed.parse::<i64>() {
            return Some(Self(millis));
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
            .map(|v| Self(v.trunc() as i64))
    }

    /// Converts to a UTC instant; `None` when outside chrono's range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
    }
}

impl std::fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn severity_defaults_to_info_and_serialises_upper_case() {
        assert_eq!(Severity::default(), Severity::Info);
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"WARNING\""
        );
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }

    #[test]
    fn entry_without_attributes_omits_them_on_the_wire() {
        let entry = LogEntry::new("Spinnaker: hello", Severity::Info);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({ "message": "Spinnaker: hello", "severity": "INFO" })
        );
    }

    #[test]
    fn empty_attribute_values_are_dropped() {
        let entry =
            LogEntry::new("m", Severity::Info).with_attributes(Some("billing"), Some(""));
        assert_eq!(entry.application.as_ref().map(|a| a.as_str()), Some("billing"));
        assert_eq!(entry.pipeline, None);
    }

    #[test]
    fn epoch_millis_parses_wire_forms() {
        assert_eq!(EpochMillis::parse("1700000000000"), Some(EpochMillis::new(1_700_000_000_000)));
        assert_eq!(EpochMillis::parse(" 42.9 "), Some(EpochMillis::new(42)));
        assert_eq!(EpochMillis::parse("soon"), None);
        assert_eq!(EpochMillis::parse("NaN"), None);
    }
}
