/// Cancel `token` on Ctrl-C (or SIGTERM on unix).
///
/// Abort the returned handle once the run is over.
pub fn listen(token: tokio_util::sync::CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => return,
            signal = wait_for_signal() => {
                if let Err(error) = signal {
                    tracing::error!("failed to listen for shutdown signals: {}", error);
                    return;
                }
            }
        }
        tracing::warn!("interrupted, stopping transfer");
        token.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
