//! Console sink: audit entries become `tracing` events on the `audit` target.
//!
//! Used when no logging backend is configured (local runs, tests, or hosts
//! whose stdout is already shipped to a log pipeline).

use async_trait::async_trait;
use audit::{LogEntry, LogSink, Severity, SinkError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

#[async_trait]
impl LogSink for ConsoleSink {
    async fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let application = entry.application.as_ref().map(|a| a.as_str());
        let pipeline = entry.pipeline.as_ref().map(|p| p.as_str());
        match entry.severity {
            Severity::Info => info!(target: "audit", application, pipeline, "{}", entry.message),
            Severity::Warning => warn!(target: "audit", application, pipeline, "{}", entry.message),
            Severity::Error => error!(target: "audit", application, pipeline, "{}", entry.message),
            Severity::Debug => debug!(target: "audit", application, pipeline, "{}", entry.message),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_writes_never_fail() {
        let entry = LogEntry::new("Spinnaker: hi", Severity::Error)
            .with_attributes(Some("billing"), None);
        assert!(ConsoleSink.write(&entry).await.is_ok());
    }
}
