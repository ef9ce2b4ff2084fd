//! Best-effort termination of background tasks when the host process exits.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::task_manager::BackgroundTaskManager;

/// Spawns a listener that waits for an interrupt or termination signal and
/// then gracefully terminates every still-running task. Best-effort: the
/// host may exit before any forced-kill escalation could run, so none is
/// scheduled here.
pub fn spawn_signal_listener(manager: Arc<BackgroundTaskManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, terminating background tasks");
        manager.shutdown_all().await;
    })
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::SignalKind;
    use tokio::signal::unix::signal;

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
