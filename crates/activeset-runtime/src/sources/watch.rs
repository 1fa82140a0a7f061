use std::path::{Path, PathBuf};

use activeset_core::Snapshot;
use activeset_provider::{ProviderEvent, diff_snapshots, load_snapshot};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Watches the states file and emits a [`ProviderEvent::StateChanged`] for
/// every entity whose state differs from the previous read.
///
/// The parent directory is watched rather than the file itself, because
/// writers replace the file by rename.
pub struct StatesWatcher {
    path: PathBuf,
    tx: mpsc::UnboundedSender<ProviderEvent>,
}

impl StatesWatcher {
    pub fn new(path: impl Into<PathBuf>, tx: mpsc::UnboundedSender<ProviderEvent>) -> Self {
        Self {
            path: path.into(),
            tx,
        }
    }

    /// Watch until cancelled or until nobody listens any more.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), notify::Error> {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        let dir = watch_dir(&self.path);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "watching states file");

        let mut previous = match load_snapshot(&self.path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "initial states read failed: {e}");
                Snapshot::default()
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = notify_rx.recv() => match event {
                    Some(Ok(event)) => {
                        if self.is_relevant(&event) && !self.rescan(&mut previous) {
                            break;
                        }
                    }
                    Some(Err(e)) => tracing::warn!("states watcher error: {e}"),
                    None => break,
                },
            }
        }
        Ok(())
    }

    fn is_relevant(&self, event: &Event) -> bool {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return false;
        }
        let Some(name) = self.path.file_name() else {
            return false;
        };
        event.paths.iter().any(|p| p.file_name() == Some(name))
    }

    /// Re-read the file and forward differences. Returns `false` once the
    /// event channel is closed.
    fn rescan(&self, previous: &mut Snapshot) -> bool {
        let current = match load_snapshot(&self.path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Partially written or briefly missing; the next event retries.
                tracing::debug!(path = %self.path.display(), "states re-read failed: {e}");
                return true;
            }
        };
        for event in diff_snapshots(previous, &current) {
            tracing::debug!(?event, "states file change");
            if self.tx.send(event).is_err() {
                return false;
            }
        }
        *previous = current;
        true
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
