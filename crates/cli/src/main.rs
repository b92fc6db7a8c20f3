//! Spinnaker audit relay entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: read the JSON configuration file named by
//!    `--config` and validate it ([`config::RelayConfig`]).
//! 2. **Wire observability**: install `tracing-subscriber` with a JSON layer
//!    and, when configured, an OpenTelemetry OTLP exporter ([`telemetry`]).
//! 3. **Construct infrastructure**: build the log sink (Cloud Logging when a
//!    backend is configured, console otherwise) and the request processor.
//! 4. **Serve**: run the webhook receiver until Ctrl+C or SIGTERM, then
//!    flush telemetry.

mod config;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use audit::{AuditRelay, Classifier, LogSink};
use clap::Parser;
use config::{EnvOverrides, RelayConfig};
use listener::ListenerState;
use sink::{CloudLoggingConfig, CloudLoggingSink, ConsoleSink};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "spinnaker-audit-relay";

/// Receives Spinnaker webhook events and writes audit log entries.
#[derive(Debug, Parser)]
#[command(name = "spinnaker-audit-relay", version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, env = "AUDIT_RELAY_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Address to listen on; overrides `listen` from the configuration file.
    #[arg(long, env = "AUDIT_RELAY_LISTEN")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let telemetry = telemetry::init(SERVICE_NAME)?;

    let config = RelayConfig::load(&args.config, EnvOverrides::from_process_env(), args.listen)
        .with_context(|| format!("failed to load configuration from '{}'", args.config.display()))?;
    info!(
        timezone = %config.formatter.timezone(),
        listen = %config.listen,
        "Configuration loaded"
    );

    let sink = build_sink(&config).await?;
    let relay = AuditRelay::new(config.credentials.clone(), Classifier::new(config.formatter));

    let tcp = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    listener::serve(tcp, ListenerState::new(relay, sink), shutdown_signal())
        .await
        .context("webhook server failed")?;

    info!("Shut down");
    telemetry.shutdown();
    Ok(())
}

async fn build_sink(config: &RelayConfig) -> anyhow::Result<Arc<dyn LogSink>> {
    let Some(backend) = &config.backend else {
        warn!("No logging backend configured; audit entries go to the console");
        return Ok(Arc::new(ConsoleSink));
    };

    // Fail at startup on an unreadable token; the sink re-reads it per write.
    if let Some(path) = &backend.credentials_file {
        sink::read_access_token(path).await?;
    }
    let cloud = CloudLoggingSink::new(CloudLoggingConfig {
        project_id: backend.project_id.clone(),
        log_name: backend.log_name.clone(),
        endpoint: backend.endpoint.clone(),
        credentials_file: backend.credentials_file.clone(),
    })?;
    info!(log_name = cloud.log_name(), "Writing audit entries to Cloud Logging");
    Ok(Arc::new(cloud))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received; draining in-flight requests");
}
