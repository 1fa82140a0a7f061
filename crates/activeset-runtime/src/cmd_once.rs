//! `activeset once`: one pass per job over a states file, without writing
//! anything back.

use std::collections::BTreeMap;
use std::sync::Arc;

use activeset_core::{EntityId, Settings, Snapshot};
use activeset_provider::{MemoryProvider, load_snapshot};
use anyhow::Context;

use crate::cli::OnceOpts;
use crate::job::ActiveSetJob;
use crate::settings::{JobSpec, build_jobs};
use crate::trigger::Trigger;

pub async fn cmd_once(opts: OnceOpts, settings: &Settings) -> anyhow::Result<()> {
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
    let snapshot = load_snapshot(&opts.states)
        .with_context(|| format!("failed to load states from {}", opts.states.display()))?;

    let groups = run_once(snapshot, &built.jobs).await?;
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}

/// Run every job once over `snapshot` and return the resulting memberships
/// keyed by output group.
pub async fn run_once(
    snapshot: Snapshot,
    jobs: &[JobSpec],
) -> anyhow::Result<BTreeMap<EntityId, Vec<EntityId>>> {
    let provider = Arc::new(MemoryProvider::from_snapshot(snapshot));
    for spec in jobs {
        let job = ActiveSetJob::new(
            spec.name.clone(),
            Arc::clone(&spec.config),
            Arc::clone(&provider),
        );
        job.run_pass(Trigger::Restart)
            .await
            .with_context(|| format!("job {} failed", spec.name))?;
    }
    Ok(provider.groups())
}
