// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vktg serve` command implementation.
//!
//! Opens the SQLite store, connects the VK client and the Telegram bot,
//! then runs the poll loop alongside the operator control loop until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use vktg_config::VktgConfig;
use vktg_core::{HealthStatus, PluginAdapter, RelayError, StorageAdapter};
use vktg_relay::{BackoffPolicy, PollLoop, Relay, recording};
use vktg_storage::SqliteStorage;
use vktg_telegram::TelegramDestination;
use vktg_vk::{FetchFrameRenderer, VkClient};

use crate::shutdown;

/// Grace period for operator tasks still running at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the relay until SIGINT or SIGTERM.
pub async fn run_serve(config: VktgConfig) -> Result<(), RelayError> {
    init_tracing(&config.relay.log_level);
    recording::register_metrics();

    info!("starting vktg serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");

    let api = Arc::new(VkClient::new(&config.vk)?);
    let renderer = Arc::new(FetchFrameRenderer::new(Duration::from_secs(
        config.vk.request_timeout_secs,
    ))?);

    let mut telegram = TelegramDestination::new(config.telegram.clone())?;
    telegram.connect();
    let telegram = Arc::new(telegram);
    log_health(telegram.as_ref()).await;

    let relay = Arc::new(Relay::new(
        &config,
        api.clone(),
        storage.clone(),
        telegram.clone(),
        renderer,
    )?);
    let poll_loop = PollLoop::new(
        api,
        relay.clone(),
        telegram.clone(),
        BackoffPolicy::from_config(&config.retry),
    );

    let cancel = shutdown::install_signal_handler();
    let poll_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { poll_loop.run(cancel).await }
    });

    let tracker = TaskTracker::new();
    run_control_loop(&telegram, &relay, &tracker, &cancel).await;

    tracker.close();
    shutdown::drain_tasks(&tracker, DRAIN_TIMEOUT).await;

    if let Err(e) = poll_handle.await {
        error!(error = %e, "poll loop task failed");
    }
    if let Err(e) = telegram.shutdown().await {
        warn!(error = %e, "Telegram shutdown failed");
    }
    storage.close().await?;

    info!("vktg serve shutdown complete");
    Ok(())
}

/// Receives operator events and handles each on its own task.
///
/// Returns once `cancel` fires or the Telegram dispatcher goes away; in the
/// latter case the whole process is told to stop.
async fn run_control_loop(
    telegram: &TelegramDestination,
    relay: &Arc<Relay>,
    tracker: &TaskTracker,
    cancel: &CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = telegram.receive() => event,
            _ = cancel.cancelled() => {
                debug!("control loop stopping");
                return;
            }
        };

        match event {
            Ok(event) => {
                let relay = relay.clone();
                tracker.spawn(async move {
                    if let Err(e) = relay.handle_control(event).await {
                        error!(error = %e, "operator event failed");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "control channel closed, shutting down");
                cancel.cancel();
                return;
            }
        }
    }
}

async fn log_health(adapter: &dyn PluginAdapter) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = adapter.name(), "adapter healthy"),
        Ok(HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter not healthy, continuing")
        }
        Err(e) => warn!(adapter = adapter.name(), error = %e, "health check failed"),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vktg={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
