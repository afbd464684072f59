//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives
//! `SIGINT`, `SIGTERM` or `SIGQUIT` (Unix) or Ctrl-C (other platforms).

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Like [`wait_for_shutdown_signal`], but never completes if registration fails.
pub async fn shutdown_signal() {
    if let Err(err) = wait_for_shutdown_signal().await {
        tracing::warn!(error = %err, "signal handlers unavailable, relying on the worker token");
        std::future::pending::<()>().await;
    }
}
