//! Coordinator messages and provider-event classification.

use activeset_core::{ACTIVE_TOKEN, JobConfig};
use activeset_provider::ProviderEvent;

/// One message per trigger source, consumed in arrival order by a job's
/// coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Interval timer fired.
    Tick,
    /// The state provider or its host (re)started.
    Restart,
    /// The demand entity was switched on.
    Demand,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Restart => "restart",
            Self::Demand => "demand",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a provider notification onto a trigger for the job, if it is one.
///
/// Only a transition of the demand entity *to* the active token counts;
/// repeated `on` reports and every other entity are ignored.
pub fn classify(event: &ProviderEvent, config: &JobConfig) -> Option<Trigger> {
    match event {
        ProviderEvent::SystemStarted => Some(Trigger::Restart),
        ProviderEvent::StateChanged {
            entity_id,
            old,
            new,
        } => {
            let demand = config.on_demand()?;
            let was_on = old.as_ref().is_some_and(|s| s.canonical() == ACTIVE_TOKEN);
            (entity_id == demand && new.canonical() == ACTIVE_TOKEN && !was_on)
                .then_some(Trigger::Demand)
        }
    }
}
