//! Job host: wires trigger sources to one coordinator per job and runs
//! until shutdown.

use std::sync::Arc;

use activeset_provider::{FileProvider, ProviderEvent, StateProvider};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cli::RunOpts;
use crate::job::ActiveSetJob;
use crate::settings::{JobSpec, build_jobs};
use crate::sources::events::{Route, route_events};
use crate::sources::interval::run_interval;
use crate::sources::signal::forward_hangups;
use crate::sources::watch::StatesWatcher;

/// Pending triggers per job before sources wait on the coordinator.
const TRIGGER_QUEUE: usize = 64;

/// `activeset run`: host every valid job against the file provider.
pub async fn run_host(opts: RunOpts, settings: &activeset_core::Settings) -> anyhow::Result<()> {
    let built = build_jobs(settings, opts.job.as_deref())?;
    if built.jobs.is_empty() {
        anyhow::bail!("no job could be initialized");
    }
    if !built.failures.is_empty() {
        tracing::warn!(
            skipped = built.failures.len(),
            started = built.jobs.len(),
            "some jobs were skipped because of configuration errors"
        );
    }

    let provider = Arc::new(FileProvider::new(&opts.states, &opts.output));
    let cancel = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let mut tasks = start_jobs(provider, built.jobs, event_rx, cancel.clone()).await;

    let watcher = StatesWatcher::new(&opts.states, event_tx.clone());
    let watch_cancel = cancel.clone();
    tasks.spawn(async move {
        if let Err(e) = watcher.run(watch_cancel).await {
            tracing::warn!("states watcher unavailable, demand triggers disabled: {e}");
        }
    });
    let signal_cancel = cancel.clone();
    tasks.spawn(async move {
        if let Err(e) = forward_hangups(event_tx, signal_cancel).await {
            tracing::warn!("SIGHUP handler unavailable: {e}");
        }
    });

    shutdown_signal().await;
    cancel.cancel();
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::warn!("task ended abnormally: {e}");
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Initialize each job, arm its interval and start its coordinator, then
/// start routing provider notifications to them.
pub async fn start_jobs<P: StateProvider + 'static>(
    provider: Arc<P>,
    jobs: Vec<JobSpec>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    cancel: CancellationToken,
) -> JoinSet<()> {
    let mut tasks = JoinSet::new();
    let mut routes = Vec::with_capacity(jobs.len());

    for spec in jobs {
        let job = ActiveSetJob::new(
            spec.name.clone(),
            Arc::clone(&spec.config),
            Arc::clone(&provider),
        );
        job.initialize().await;

        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE);
        tasks.spawn(run_interval(tx.clone(), spec.config.interval(), cancel.clone()));
        let job_cancel = cancel.clone();
        tasks.spawn(async move { job.run(rx, job_cancel).await });

        tracing::info!(
            job = %spec.name,
            group = %spec.config.active_group(),
            interval_secs = spec.config.interval().as_secs(),
            on_demand = ?spec.config.on_demand().map(|d| d.as_str()),
            "triggers armed"
        );
        routes.push(Route {
            job: spec.name,
            config: spec.config,
            tx,
        });
    }

    tasks.spawn(route_events(events, routes, cancel));
    tasks
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }
}
