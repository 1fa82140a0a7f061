use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::trigger::Trigger;

/// Send a [`Trigger::Tick`] every `period`, the first one immediately.
/// Returns when cancelled or when the coordinator is gone.
pub async fn run_interval(
    tx: mpsc::Sender<Trigger>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match tx.try_send(Trigger::Tick) {
                Ok(()) => {}
                // A queued trigger already covers this tick.
                Err(TrySendError::Full(_)) => tracing::debug!("coordinator busy, tick dropped"),
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("coordinator gone, interval source stopping");
                    break;
                }
            },
        }
    }
}
