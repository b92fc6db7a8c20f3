//! HTTP surface of the webhook receiver.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /`, `POST /webhook` | Spinnaker echo webhook target |
//! | `GET /healthz` | Liveness probe, unauthenticated |

use std::future::Future;
use std::sync::Arc;

use audit::{AuditError, AuditRelay, LogSink, RequestId};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

use crate::dispatch::dispatch;

/// Shared, read-only state of the receiver.
#[derive(Clone)]
pub struct ListenerState {
    relay: Arc<AuditRelay>,
    sink: Arc<dyn LogSink>,
}

impl ListenerState {
    pub fn new(relay: AuditRelay, sink: Arc<dyn LogSink>) -> Self {
        Self {
            relay: Arc::new(relay),
            sink,
        }
    }
}

/// Builds the receiver's router.
pub fn router(state: ListenerState) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/webhook", post(receive_event))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the receiver on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ListenerState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Spinnaker audit webhook listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive_event(
    State(state): State<ListenerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = RequestId::new_random();
    let span = info_span!("spinnaker_event", %request_id);

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    span.in_scope(|| match state.relay.process(authorization, &body) {
        Ok(processed) => {
            let acknowledgement = processed.acknowledgement();
            if let Some(entry) = processed.entry {
                dispatch(state.sink.clone(), entry, span.clone());
            }
            (StatusCode::OK, acknowledgement).into_response()
        }
        Err(e) => error_response(e),
    })
}

/// Single mapping from request errors to HTTP answers.
fn error_response(err: AuditError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if err.is_rejection() {
        warn!(status = status.as_u16(), error = %err, "Rejected Spinnaker webhook");
    } else {
        error!(status = status.as_u16(), error = %err, "Failed to process Spinnaker event");
    }
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use audit::{Classifier, Credentials, LogEntry, Severity, SinkError, ZonedFormatter};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct RecordingSink {
        tx: mpsc::UnboundedSender<LogEntry>,
    }

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
            let _ = self.tx.send(entry.clone());
            Ok(())
        }
    }

    fn app() -> (Router, mpsc::UnboundedReceiver<LogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = AuditRelay::new(
            Credentials::new("echo", "s3cret").unwrap(),
            Classifier::new(ZonedFormatter::from_name("UTC").unwrap()),
        );
        let state = ListenerState::new(relay, Arc::new(RecordingSink { tx }));
        (router(state), rx)
    }

    fn request(auth: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn valid_auth() -> String {
        format!("Basic {}", STANDARD.encode("echo:s3cret"))
    }

    fn event(event_type: &str, content: Value) -> Value {
        json!({
            "eventName": "spinnaker_events",
            "payload": {
                "details": { "source": "orca", "type": event_type, "created": "1136239445000" },
                "content": content
            }
        })
    }

    fn canceled_event() -> Value {
        event(
            "orca:pipeline:failed",
            json!({
                "execution": {
                    "name": "deploy-prod",
                    "application": "billing",
                    "canceled": true,
                    "canceledBy": "alice",
                    "cancellationReason": "budget"
                }
            }),
        )
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Collects every entry dispatched before the router and its tasks are
    /// dropped.
    async fn drain(mut rx: mpsc::UnboundedReceiver<LogEntry>) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        while let Ok(Some(entry)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            entries.push(entry);
        }
        entries
    }

    #[tokio::test]
    async fn classified_event_is_acknowledged_and_dispatched() {
        let (app, rx) = app();
        let (status, body) = send(app, request(Some(&valid_auth()), &canceled_event())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Success: spinnaker_events");

        let entries = drain(rx).await;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.severity, Severity::Warning);
        assert!(entry.message.contains("alice"));
        assert!(entry.message.contains("\"budget\""));
        assert_eq!(entry.application.as_ref().map(|a| a.as_str()), Some("billing"));
        assert_eq!(entry.pipeline.as_ref().map(|p| p.as_str()), Some("deploy-prod"));
    }

    #[tokio::test]
    async fn bad_credentials_are_401_without_entry() {
        let (app, rx) = app();
        let wrong = format!("Basic {}", STANDARD.encode("echo:nope"));
        let (status, body) = send(app, request(Some(&wrong), &canceled_event())).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid credentials");
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn missing_authorization_header_is_401() {
        let (app, rx) = app();
        let (status, _) = send(app, request(None, &canceled_event())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_envelope_is_400_without_entry() {
        for body in [
            json!({ "eventName": "build_events", "payload": {} }),
            json!({ "eventName": "spinnaker_events" }),
        ] {
            let (app, rx) = app();
            let (status, text) = send(app, request(Some(&valid_auth()), &body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(text, "Spinnaker audit log request body is malformed.");
            assert!(drain(rx).await.is_empty());
        }
    }

    #[tokio::test]
    async fn unmatched_event_is_200_with_no_entry() {
        let (app, rx) = app();
        let (status, body) = send(
            app,
            request(Some(&valid_auth()), &event("unknown:event", json!({}))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Success: spinnaker_events");
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn missing_nested_structure_is_500_without_entry() {
        let (app, rx) = app();
        let (status, body) = send(
            app,
            request(Some(&valid_auth()), &event("orca:pipeline:complete", json!({}))),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Missing required field 'content.execution'");
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn repeated_event_is_logged_twice() {
        let (app, rx) = app();
        for _ in 0..2 {
            let (status, _) = send(
                app.clone(),
                request(Some(&valid_auth()), &canceled_event()),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        drop(app);

        let entries = drain(rx).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entries[1]);
    }

    #[tokio::test]
    async fn webhook_alias_and_health_probe() {
        let (app, _rx) = app();
        let mut req = request(Some(&valid_auth()), &canceled_event());
        *req.uri_mut() = "/webhook".parse().unwrap();
        let (status, _) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);

        let health = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, health).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
