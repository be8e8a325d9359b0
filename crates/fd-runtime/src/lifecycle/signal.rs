use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on the first Ctrl-C or SIGTERM.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        fd_info!(sys, signal = "SIGINT", "received signal, shutting down");
                    }
                    _ = sigterm.recv() => {
                        fd_info!(sys, signal = "SIGTERM", "received signal, shutting down");
                    }
                }
            }
            Err(e) => {
                fd_warn!(sys, error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
                wait_for_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    cancel.cancel();
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => fd_info!(sys, signal = "SIGINT", "received signal, shutting down"),
        Err(e) => fd_warn!(sys, error = %e, "Ctrl-C handler failed, shutting down"),
    }
}
