use activeset_provider::ProviderEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Forward SIGHUP as [`ProviderEvent::SystemStarted`]: the operator's way to
/// say "the state provider restarted, rebuild now".
#[cfg(unix)]
pub async fn forward_hangups(
    tx: mpsc::UnboundedSender<ProviderEvent>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!("received SIGHUP, treating as provider restart");
                if tx.send(ProviderEvent::SystemStarted).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn forward_hangups(
    _tx: mpsc::UnboundedSender<ProviderEvent>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    cancel.cancelled().await;
    Ok(())
}
