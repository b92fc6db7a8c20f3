//! Rendering of event timestamps in the operator's timezone.
//!
//! Audit messages show instants the way the Spinnaker activity feed does:
//! `Mon, 02 Jan 2006 15:04:05 MST`. The classifier only depends on the
//! [`TimestampFormatter`] port so that tests and alternative deployments can
//! supply their own rendering.

use chrono_tz::Tz;

use crate::{AuditError, EpochMillis};

/// `strftime` pattern: short weekday, day, short month, 4-digit year, 24h
/// time, timezone abbreviation.
pub const AUDIT_TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Renders epoch-millisecond instants for audit messages.
pub trait TimestampFormatter: Send + Sync {
    /// Formats `millis` for display. Returns `None` when the instant cannot be
    /// represented.
    fn format(&self, millis: EpochMillis) -> Option<String>;

    /// Parses a raw wire value and formats it.
    ///
    /// `path` names the field in errors.
    fn format_raw(&self, raw: Option<&str>, path: &'static str) -> Result<String, AuditError> {
        let invalid = || AuditError::InvalidTimestamp {
            path,
            value: raw.unwrap_or("<absent>").to_string(),
        };
        let millis = raw.and_then(EpochMillis::parse).ok_or_else(invalid)?;
        self.format(millis).ok_or_else(invalid)
    }
}

/// Formats instants in a fixed IANA timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedFormatter {
    tz: Tz,
}

impl ZonedFormatter {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Builds a formatter from an IANA identifier such as `"America/Chicago"`.
    /// Returns `None` for unknown identifiers.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::new)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl TimestampFormatter for ZonedFormatter {
    fn format(&self, millis: EpochMillis) -> Option<String> {
        millis.to_datetime().map(|utc| {
            utc.with_timezone(&self.tz)
                .format(AUDIT_TIMESTAMP_FORMAT)
                .to_string()
        })
    }
}
