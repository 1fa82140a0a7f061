use std::sync::Arc;

use activeset_core::JobConfig;
use activeset_provider::ProviderEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::trigger::{Trigger, classify};

/// Delivery target for one job.
pub struct Route {
    pub job: String,
    pub config: Arc<JobConfig>,
    pub tx: mpsc::Sender<Trigger>,
}

/// Classify every provider notification against every job and forward the
/// resulting triggers. Returns when cancelled or when the event stream ends.
///
/// Delivery never waits on a job: a full queue already holds a pending
/// full rescan, so the new trigger is dropped.
pub async fn route_events(
    mut rx: mpsc::UnboundedReceiver<ProviderEvent>,
    routes: Vec<Route>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        for route in &routes {
            let Some(trigger) = classify(&event, &route.config) else {
                continue;
            };
            tracing::info!(job = %route.job, trigger = %trigger, "trigger received");
            match route.tx.try_send(trigger) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(job = %route.job, trigger = %trigger, "job busy, trigger dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!(job = %route.job, "failed to deliver trigger: job stopped");
                }
            }
        }
    }
    tracing::debug!("event router stopped");
}
