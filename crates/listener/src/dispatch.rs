//! Detached delivery of audit entries.
//!
//! The webhook is acknowledged before the sink write completes. The write
//! runs as its own task inside the request span; a failed write is reported
//! on the process's own log output together with the entry it dropped.

use std::sync::Arc;

use audit::{LogEntry, LogSink};
use tokio::task::JoinHandle;
use tracing::{debug, error, Instrument, Span};

/// Spawns the write of `entry` to `sink`. The returned handle resolves once
/// the write has finished, successfully or not.
pub fn dispatch(sink: Arc<dyn LogSink>, entry: LogEntry, span: Span) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            match sink.write(&entry).await {
                Ok(()) => debug!(severity = %entry.severity, "Audit entry delivered"),
                Err(e) => error!(
                    error = %e,
                    severity = %entry.severity,
                    audit_message = %entry.message,
                    "Dropped audit entry"
                ),
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use audit::{Severity, SinkError};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FailingSink {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl LogSink for FailingSink {
        async fn write(&self, _entry: &LogEntry) -> Result<(), SinkError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::Transport {
                message: "connection refused".into(),
            })
        }
    }

    /// Collects formatted log lines in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn events(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[tokio::test]
    async fn failed_write_is_attempted_once_and_reported() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        // The current-thread test runtime polls the spawned task on this thread.
        let _guard = tracing::subscriber::set_default(subscriber);

        let sink = Arc::new(FailingSink::default());
        let handle = dispatch(
            sink.clone(),
            LogEntry::new("Spinnaker: hi", Severity::Info),
            Span::none(),
        );

        assert!(handle.await.is_ok());
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);

        let events = logs.events();
        let dropped = events
            .iter()
            .find(|event| event["fields"]["message"] == "Dropped audit entry")
            .expect("a dropped-entry event");
        assert_eq!(dropped["level"], "ERROR");
        assert_eq!(dropped["fields"]["audit_message"], "Spinnaker: hi");
        assert_eq!(dropped["fields"]["error"], "Log backend request failed: connection refused");
    }
}
