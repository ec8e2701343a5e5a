// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `cadence serve` command implementation.
//!
//! Opens the database, selects the transport from `[smtp]`, wires the
//! built-in content provider and reply classifier into an [`Engine`], and
//! runs its background loops until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cadence_bus::EventBus;
use cadence_compose::BuiltinContent;
use cadence_config::model::CadenceConfig;
use cadence_core::types::HealthStatus;
use cadence_core::{CadenceError, ContentProvider, PluginAdapter, ReplyClassifier, TransportAdapter};
use cadence_reply::KeywordClassifier;
use cadence_sequencer::{CleanupReport, Engine};
use cadence_storage::Database;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info, warn};

use crate::shutdown;

/// How long in-flight ticks get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// The pluggable collaborators of one engine.
struct Adapters {
    transport: Arc<dyn TransportAdapter>,
    content: Arc<dyn ContentProvider>,
    classifier: Arc<dyn ReplyClassifier>,
}

impl Adapters {
    fn from_config(config: &CadenceConfig) -> Result<Self, CadenceError> {
        Ok(Self {
            transport: cadence_email::from_config(&config.smtp)?,
            content: Arc::new(BuiltinContent),
            classifier: Arc::new(KeywordClassifier::new()),
        })
    }

    async fn log_health(&self) {
        log_adapter_health("transport", self.transport.as_ref()).await;
        log_adapter_health("content", self.content.as_ref()).await;
        log_adapter_health("classifier", self.classifier.as_ref()).await;
    }
}

async fn log_adapter_health<A: PluginAdapter + ?Sized>(role: &str, adapter: &A) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => {
            info!(role, adapter = adapter.name(), version = %adapter.version(), "adapter ready");
        }
        Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(role, adapter = adapter.name(), reason = %reason, "adapter not fully healthy");
        }
        Err(e) => warn!(role, adapter = adapter.name(), error = %e, "adapter health check failed"),
    }
}

async fn open_engine(config: &CadenceConfig, adapters: Adapters) -> Result<Engine, CadenceError> {
    let db = Database::from_config(&config.storage).await?;
    Ok(Engine::new(
        db,
        config.clone(),
        EventBus::default(),
        adapters.transport,
        adapters.content,
        adapters.classifier,
    ))
}

/// Engine for the one-shot operator commands.
pub async fn build_engine(config: &CadenceConfig) -> Result<Engine, CadenceError> {
    open_engine(config, Adapters::from_config(config)?).await
}

/// Runs the `cadence serve` command.
pub async fn run_serve(config: CadenceConfig) -> Result<(), CadenceError> {
    info!(name = %config.engine.name, "starting cadence serve");

    install_metrics(&config)?;

    let adapters = Adapters::from_config(&config)?;
    adapters.log_health().await;
    let engine = Arc::new(open_engine(&config, adapters).await?);

    // Crash recovery: work left `processing` or `sending` by a previous run
    // goes back to the queue before the loops start.
    let recovered = engine.cleanup(Utc::now()).await?;
    if recovered != CleanupReport::default() {
        info!(
            jobs = recovered.jobs_recovered,
            queue = recovered.queue_recovered,
            locks = recovered.locks_released,
            claims = recovered.claims_recovered,
            "recovered work from previous run"
        );
    }

    let cancel = shutdown::install_signal_handler();
    let handles = engine.spawn(cancel.clone())?;

    if let Err(e) = engine.scan(Utc::now()).await {
        warn!(error = %e, "startup scan failed (non-fatal)");
    }

    cancel.cancelled().await;
    info!(tasks = handles.len(), "waiting for background tasks to stop");
    shutdown::drain_tasks(handles, SHUTDOWN_GRACE).await;

    info!("cadence serve shutdown complete");
    Ok(())
}

/// Install the Prometheus exporter when `engine.metrics_listen` is set.
fn install_metrics(config: &CadenceConfig) -> Result<(), CadenceError> {
    let Some(listen) = &config.engine.metrics_listen else {
        debug!("metrics export disabled");
        return Ok(());
    };
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| CadenceError::Config(format!("engine.metrics_listen `{listen}`: {e}")))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| CadenceError::Internal(format!("failed to install Prometheus exporter: {e}")))?;
    cadence_delivery::recording::register_metrics();
    info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cadence={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
