//! Active-set job coordinator.
//!
//! One coordinator task per job consumes [`Trigger`]s from a single ordered
//! channel and runs one aggregation pass per message. Provider calls are
//! blocking and run on the blocking pool; the configuration is immutable and
//! shared through `Arc`.

use std::sync::Arc;

use activeset_core::{EntityId, INACTIVE_TOKEN, JobConfig, RawState};
use activeset_provider::{ProviderError, StateProvider};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::publisher::publish;
use crate::trigger::Trigger;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("state provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("pass task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of one completed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub trigger: Trigger,
    pub members: Vec<EntityId>,
    pub completed_at: DateTime<Utc>,
}

pub struct ActiveSetJob<P> {
    name: String,
    config: Arc<JobConfig>,
    provider: Arc<P>,
}

impl<P: StateProvider + 'static> ActiveSetJob<P> {
    pub fn new(name: impl Into<String>, config: Arc<JobConfig>, provider: Arc<P>) -> Self {
        Self {
            name: name.into(),
            config,
            provider,
        }
    }

    /// Put the demand entity into a known `off` baseline.
    ///
    /// A failure is logged; the job still starts.
    pub async fn initialize(&self) {
        let Some(demand) = self.config.on_demand().cloned() else {
            return;
        };
        let provider = Arc::clone(&self.provider);
        let result = tokio::task::spawn_blocking(move || reset_demand(&*provider, &demand)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(job = %self.name, "failed to reset demand entity at startup: {e}"),
            Err(e) => warn!(job = %self.name, "demand reset task failed: {e}"),
        }
    }

    /// Main event loop. Runs until the trigger channel is closed or the
    /// cancellation token is triggered; an in-flight pass always completes.
    pub async fn run(&self, mut rx: mpsc::Receiver<Trigger>, cancel: CancellationToken) {
        info!(job = %self.name, "coordinator started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job = %self.name, "cancellation requested, coordinator stopping");
                    break;
                }
                trigger = rx.recv() => {
                    match trigger {
                        Some(trigger) => {
                            // Failures are self-healing: the next trigger rescans everything.
                            if let Err(e) = self.run_pass(trigger).await {
                                warn!(job = %self.name, trigger = %trigger, "pass failed: {e}");
                            }
                        }
                        None => {
                            info!(job = %self.name, "trigger channel closed, coordinator stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Fetch a full snapshot, aggregate, publish. A demand pass additionally
    /// resets the demand entity afterwards, whatever the pass outcome.
    pub async fn run_pass(&self, trigger: Trigger) -> Result<PassReport, PassError> {
        let config = Arc::clone(&self.config);
        let provider = Arc::clone(&self.provider);
        let report =
            tokio::task::spawn_blocking(move || execute_pass(&*provider, &config, trigger))
                .await??;

        match trigger {
            Trigger::Tick => debug!(
                job = %self.name,
                group = %self.config.active_group(),
                members = report.members.len(),
                "timer pass complete"
            ),
            Trigger::Restart | Trigger::Demand => info!(
                job = %self.name,
                trigger = %trigger,
                group = %self.config.active_group(),
                members = report.members.len(),
                completed_at = %report.completed_at,
                "pass complete"
            ),
        }
        Ok(report)
    }
}

/// Resets the demand entity when dropped.
///
/// Created before a demand pass starts, so the reset follows the publish on
/// success, on error returns and on panics alike.
struct DemandAck<'a, P: StateProvider + ?Sized> {
    provider: &'a P,
    entity_id: &'a EntityId,
}

impl<P: StateProvider + ?Sized> Drop for DemandAck<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = reset_demand(self.provider, self.entity_id) {
            warn!(entity = %self.entity_id, "failed to reset demand entity: {e}");
        }
    }
}

fn reset_demand<P: StateProvider + ?Sized>(
    provider: &P,
    entity_id: &EntityId,
) -> Result<(), ProviderError> {
    provider.set_entity_state(entity_id, &RawState::text(INACTIVE_TOKEN))
}

fn execute_pass<P: StateProvider + ?Sized>(
    provider: &P,
    config: &JobConfig,
    trigger: Trigger,
) -> Result<PassReport, PassError> {
    let _ack = match (trigger, config.on_demand()) {
        (Trigger::Demand, Some(entity_id)) => Some(DemandAck {
            provider,
            entity_id,
        }),
        _ => None,
    };

    let snapshot = provider.get_all_states()?;
    let members = config.aggregate(&snapshot);
    debug!(
        trigger = %trigger,
        entities = snapshot.len(),
        members = ?members,
        "aggregated snapshot"
    );
    publish(provider, config.active_group(), &members)?;

    Ok(PassReport {
        trigger,
        members,
        completed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use activeset_core::{ExclusionFilter, OffStates};
    use activeset_provider::{MemoryProvider, ProviderWrite};

    fn ids(members: &[EntityId]) -> Vec<&str> {
        members.iter().map(EntityId::as_str).collect()
    }

    fn group_write(group: &str, members: &[&str]) -> ProviderWrite {
        ProviderWrite::GroupMembers {
            group: EntityId::new(group),
            members: members.iter().map(|m| EntityId::new(*m)).collect(),
        }
    }

    fn reset_write(entity: &str) -> ProviderWrite {
        ProviderWrite::EntityState {
            entity_id: EntityId::new(entity),
            state: RawState::text("off"),
        }
    }

    fn job(config: JobConfig, provider: &Arc<MemoryProvider>) -> ActiveSetJob<MemoryProvider> {
        ActiveSetJob::new("test", Arc::new(config), Arc::clone(provider))
    }

    fn demand_job(provider: &Arc<MemoryProvider>) -> ActiveSetJob<MemoryProvider> {
        job(
            JobConfig::new("group.active").with_on_demand("input_boolean.refresh"),
            provider,
        )
    }

    #[tokio::test]
    async fn tick_pass_publishes_clear_then_set() {
        let provider = Arc::new(
            MemoryProvider::new()
                .with_entity("light.kitchen", "on")
                .with_entity("light.hall", "off")
                .with_entity("group.all_lights", "on")
                .with_entity("zone.home", "home"),
        );
        let config = JobConfig::new("group.active")
            .with_off_states(OffStates::new(["off"]))
            .with_exclusions(ExclusionFilter::new(["group", "zone"]));
        let job = job(config, &provider);

        let report = job.run_pass(Trigger::Tick).await.expect("pass");

        assert_eq!(ids(&report.members), ["light.kitchen"]);
        assert_eq!(report.trigger, Trigger::Tick);
        assert_eq!(
            provider.writes(),
            vec![
                group_write("group.active", &[]),
                group_write("group.active", &["light.kitchen"]),
            ]
        );
    }

    #[tokio::test]
    async fn empty_snapshot_still_publishes() {
        let provider = Arc::new(MemoryProvider::new());
        let job = job(JobConfig::new("group.active"), &provider);

        let report = job.run_pass(Trigger::Restart).await.expect("pass");

        assert!(report.members.is_empty());
        assert_eq!(
            provider.writes(),
            vec![group_write("group.active", &[]), group_write("group.active", &[])]
        );
    }

    #[tokio::test]
    async fn each_pass_rereads_the_snapshot() {
        let provider = Arc::new(MemoryProvider::new().with_entity("light.a", "on"));
        let job = job(JobConfig::new("group.active"), &provider);

        job.run_pass(Trigger::Tick).await.expect("first");
        provider.set_state("light.a", "off");
        provider.set_state("fan.b", "high");
        let report = job.run_pass(Trigger::Tick).await.expect("second");

        assert_eq!(provider.snapshot_reads(), 2);
        assert_eq!(ids(&report.members), ["fan.b"]);
        assert_eq!(
            provider.group_members("group.active"),
            Some(vec![EntityId::new("fan.b")])
        );
    }

    #[tokio::test]
    async fn demand_pass_resets_flag_after_publish() {
        let provider = Arc::new(
            MemoryProvider::new()
                .with_entity("input_boolean.refresh", "on")
                .with_entity("switch.heater", "on"),
        );
        let job = demand_job(&provider);

        let report = job.run_pass(Trigger::Demand).await.expect("pass");

        assert_eq!(
            ids(&report.members),
            ["input_boolean.refresh", "input_boolean.refresh", "switch.heater"]
        );
        assert_eq!(
            provider.writes(),
            vec![
                group_write("group.active", &[]),
                group_write(
                    "group.active",
                    &["input_boolean.refresh", "input_boolean.refresh", "switch.heater"]
                ),
                reset_write("input_boolean.refresh"),
            ]
        );
        assert_eq!(provider.state_of("input_boolean.refresh"), Some(RawState::text("off")));
    }

    #[tokio::test]
    async fn demand_flag_reset_when_snapshot_fails() {
        let provider = Arc::new(MemoryProvider::new().with_entity("input_boolean.refresh", "on"));
        provider.fail_next_snapshots(1);
        let job = demand_job(&provider);

        let result = job.run_pass(Trigger::Demand).await;

        assert!(matches!(
            result,
            Err(PassError::Provider(ProviderError::Unavailable(_)))
        ));
        assert_eq!(provider.writes(), vec![reset_write("input_boolean.refresh")]);
        assert_eq!(provider.state_of("input_boolean.refresh"), Some(RawState::text("off")));
    }

    #[tokio::test]
    async fn demand_flag_reset_when_publish_fails() {
        let provider = Arc::new(MemoryProvider::new().with_entity("input_boolean.refresh", "on"));
        provider.reject_group_writes(true);
        let job = demand_job(&provider);

        assert!(job.run_pass(Trigger::Demand).await.is_err());
        assert_eq!(provider.state_of("input_boolean.refresh"), Some(RawState::text("off")));
    }

    #[tokio::test]
    async fn timer_pass_leaves_demand_flag_alone() {
        let provider = Arc::new(MemoryProvider::new().with_entity("input_boolean.refresh", "on"));
        let job = demand_job(&provider);

        job.run_pass(Trigger::Tick).await.expect("pass");

        assert_eq!(provider.state_of("input_boolean.refresh"), Some(RawState::text("on")));
        assert_eq!(provider.writes().len(), 2);
    }

    #[tokio::test]
    async fn initialize_sets_demand_baseline() {
        let provider = Arc::new(MemoryProvider::new().with_entity("input_boolean.refresh", "on"));
        let job = demand_job(&provider);

        job.initialize().await;

        assert_eq!(provider.writes(), vec![reset_write("input_boolean.refresh")]);
        assert_eq!(provider.state_of("input_boolean.refresh"), Some(RawState::text("off")));
    }

    #[tokio::test]
    async fn initialize_without_demand_writes_nothing() {
        let provider = Arc::new(MemoryProvider::new());
        let job = job(JobConfig::new("group.active"), &provider);

        job.initialize().await;

        assert!(provider.writes().is_empty());
    }

    #[tokio::test]
    async fn run_processes_triggers_in_order_until_channel_closes() {
        let provider = Arc::new(
            MemoryProvider::new()
                .with_entity("input_boolean.refresh", "on")
                .with_entity("light.a", "on"),
        );
        let job = demand_job(&provider);
        let (tx, rx) = mpsc::channel(8);

        tx.send(Trigger::Tick).await.expect("send");
        tx.send(Trigger::Demand).await.expect("send");
        tx.send(Trigger::Restart).await.expect("send");
        drop(tx);

        job.run(rx, CancellationToken::new()).await;

        let writes = provider.writes();
        // tick: 2 group writes; demand: 2 group writes + reset; restart: 2 group writes
        assert_eq!(writes.len(), 7);
        assert_eq!(writes[4], reset_write("input_boolean.refresh"));
        assert_eq!(
            writes[6],
            group_write("group.active", &["input_boolean.refresh", "light.a"])
        );
        assert_eq!(provider.snapshot_reads(), 3);
    }

    #[tokio::test]
    async fn failed_pass_does_not_stop_coordinator() {
        let provider = Arc::new(MemoryProvider::new().with_entity("light.a", "on"));
        provider.fail_next_snapshots(1);
        let job = job(JobConfig::new("group.active"), &provider);
        let (tx, rx) = mpsc::channel(8);

        tx.send(Trigger::Tick).await.expect("send");
        tx.send(Trigger::Tick).await.expect("send");
        drop(tx);

        job.run(rx, CancellationToken::new()).await;

        assert_eq!(provider.snapshot_reads(), 2);
        assert_eq!(
            provider.group_members("group.active"),
            Some(vec![EntityId::new("light.a")])
        );
    }

    #[tokio::test]
    async fn cancellation_stops_coordinator() {
        let provider = Arc::new(MemoryProvider::new());
        let job = job(JobConfig::new("group.active"), &provider);
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        job.run(rx, cancel).await;

        assert_eq!(provider.snapshot_reads(), 0);
    }
}
