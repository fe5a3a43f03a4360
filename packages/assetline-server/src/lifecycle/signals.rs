//! OS termination signals.

use anyhow::Result;
use tokio::signal;

/// Waits for SIGINT (Ctrl+C) or SIGTERM and returns the signal's name.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_signal() -> Result<String> {
    let name = tokio::select! {
        result = wait_ctrl_c() => result?,
        result = wait_sigterm() => result?,
    };
    Ok(name.to_string())
}

async fn wait_ctrl_c() -> Result<&'static str> {
    signal::ctrl_c().await.map_err(|e| {
        tracing::error!(%e, "failed to listen for SIGINT");
        e
    })?;
    Ok("SIGINT")
}

#[cfg(unix)]
async fn wait_sigterm() -> Result<&'static str> {
    let mut handler =
        signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
            tracing::error!(%e, "failed to install SIGTERM handler");
            e
        })?;
    handler.recv().await;
    Ok("SIGTERM")
}

#[cfg(not(unix))]
async fn wait_sigterm() -> Result<&'static str> {
    std::future::pending::<Result<&'static str>>().await
}
