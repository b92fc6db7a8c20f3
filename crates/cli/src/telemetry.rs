//! Observability wiring.
//!
//! All `tracing` spans and events emitted by every crate in the workspace flow
//! through one subscriber:
//!
//! - an `EnvFilter` driven by `RUST_LOG` (default `info`),
//! - a JSON fmt layer on stdout,
//! - an OpenTelemetry OTLP span exporter, only when
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use std::time::Duration;

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Config, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";

/// Flushes exporters when telemetry is torn down.
#[derive(Debug)]
pub struct TelemetryGuard {
    otel_enabled: bool,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if self.otel_enabled {
            global::shutdown_tracer_provider();
        }
    }
}

/// Installs the global subscriber.
pub fn init(service_name: &str) -> anyhow::Result<TelemetryGuard> {
    let tracer = match std::env::var(OTLP_ENDPOINT_ENV) {
        Ok(endpoint) if !endpoint.is_empty() => Some(otlp_tracer(service_name, &endpoint)?),
        _ => None,
    };
    let otel_enabled = tracer.is_some();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true),
        )
        .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(TelemetryGuard { otel_enabled })
}

fn otlp_tracer(service_name: &str, endpoint: &str) -> anyhow::Result<Tracer> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(3))
        .build()
        .context("failed to build OTLP span exporter")?;

    let provider = TracerProvider::builder()
        .with_config(Config::default().with_resource(resource))
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider.tracer(service_name.to_string()))
}
