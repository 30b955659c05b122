// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling and draining of in-flight operator tasks.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Returns a token cancelled on SIGINT (Ctrl+C) or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "cannot install SIGTERM handler, only Ctrl+C will stop the relay");
            let _ = tokio::signal::ctrl_c().await;
            info!("received SIGINT (Ctrl+C), initiating shutdown");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, initiating shutdown");
}

/// Waits up to `timeout` for tracked tasks. The tracker must be closed.
///
/// Returns `true` when every task finished in time.
pub async fn drain_tasks(tracker: &TaskTracker, timeout: Duration) -> bool {
    if tracker.is_empty() {
        info!("no operator tasks to drain");
        return true;
    }

    info!(count = tracker.len(), "waiting for operator tasks to complete");
    match tokio::time::timeout(timeout, tracker.wait()).await {
        Ok(()) => {
            info!("all operator tasks drained");
            true
        }
        Err(_) => {
            warn!(remaining = tracker.len(), "timeout reached, abandoning operator tasks");
            false
        }
    }
}
