//! Job configuration.
//!
//! [`JobOptions`] is the raw, all-optional surface read from the settings
//! file. [`JobConfig`] is the validated value built from it once at startup
//! and never mutated afterwards.

use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::error::ConfigError;
use crate::exclusion::ExclusionFilter;
use crate::normalize::{Normalizer, OffStates};
use crate::types::{EntityId, RawState, Snapshot};

/// Default seconds between timer passes.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

// ─── Raw options ──────────────────────────────────────────────────

/// Recognized options of one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobOptions {
    /// Output group identifier. Required.
    pub active_group: Option<String>,
    /// Raw values treated as inactive, unioned with `off`.
    pub off_states: Option<Vec<RawState>>,
    /// Categories never included, unioned with the built-ins.
    pub exclusion_types: Option<Vec<String>>,
    /// Seconds between timer passes.
    pub interval: Option<u64>,
    /// Manual trigger entity.
    pub on_demand: Option<String>,
}

// ─── Validated config ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JobConfig {
    active_group: EntityId,
    normalizer: Normalizer,
    exclusions: ExclusionFilter,
    interval: Duration,
    on_demand: Option<EntityId>,
}

impl JobConfig {
    /// Config with every optional field at its default.
    pub fn new(active_group: impl Into<EntityId>) -> Self {
        Self {
            active_group: active_group.into(),
            normalizer: Normalizer::default(),
            exclusions: ExclusionFilter::default(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            on_demand: None,
        }
    }

    pub fn from_options(opts: JobOptions) -> Result<Self, ConfigError> {
        let active_group = opts
            .active_group
            .filter(|g| !g.trim().is_empty())
            .ok_or(ConfigError::MissingActiveGroup)?;

        let mut config = Self::new(active_group.trim());

        if let Some(secs) = opts.interval {
            let secs = NonZeroU64::new(secs).ok_or(ConfigError::InvalidInterval(secs))?;
            config = config.with_interval_secs(secs);
        }
        if let Some(off_states) = opts.off_states {
            config = config.with_off_states(OffStates::new(off_states));
        }
        if let Some(categories) = opts.exclusion_types {
            config = config.with_exclusions(ExclusionFilter::new(categories));
        }
        if let Some(demand) = opts.on_demand.filter(|d| !d.trim().is_empty()) {
            config = config.with_on_demand(demand.trim());
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_off_states(mut self, off_states: OffStates) -> Self {
        self.normalizer = Normalizer::new(off_states);
        self
    }

    #[must_use]
    pub fn with_exclusions(mut self, exclusions: ExclusionFilter) -> Self {
        self.exclusions = exclusions;
        self
    }

    #[must_use]
    pub fn with_interval_secs(mut self, secs: NonZeroU64) -> Self {
        self.interval = Duration::from_secs(secs.get());
        self
    }

    #[must_use]
    pub fn with_on_demand(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.on_demand = Some(entity_id.into());
        self
    }

    pub fn active_group(&self) -> &EntityId {
        &self.active_group
    }

    pub fn off_states(&self) -> &OffStates {
        self.normalizer.off_states()
    }

    pub fn exclusions(&self) -> &ExclusionFilter {
        &self.exclusions
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn on_demand(&self) -> Option<&EntityId> {
        self.on_demand.as_ref()
    }

    /// Run the aggregator over `snapshot` with this job's policies.
    pub fn aggregate(&self, snapshot: &Snapshot) -> Vec<EntityId> {
        aggregate(
            snapshot,
            &self.exclusions,
            &self.normalizer,
            self.on_demand.as_ref(),
        )
    }
}

// ─── Settings file ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(default)]
    jobs: BTreeMap<String, toml::Value>,
}

/// Parsed settings file: one `[jobs.<name>]` table per job.
///
/// Job tables are kept raw so one malformed job does not prevent the
/// others from starting.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    jobs: BTreeMap<String, toml::Value>,
}

impl Settings {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(s)?;
        Ok(Self { jobs: raw.jobs })
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Options of the named job, `None` if no such job exists.
    pub fn job_options(&self, name: &str) -> Option<Result<JobOptions, ConfigError>> {
        self.jobs.get(name).map(parse_job)
    }

    /// Every job in name order with its parse result.
    pub fn jobs(&self) -> impl Iterator<Item = (&str, Result<JobOptions, ConfigError>)> {
        self.jobs
            .iter()
            .map(|(name, value)| (name.as_str(), parse_job(value)))
    }
}

fn parse_job(value: &toml::Value) -> Result<JobOptions, ConfigError> {
    value
        .clone()
        .try_into::<JobOptions>()
        .map_err(ConfigError::InvalidOptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityState;

    #[test]
    fn missing_active_group_is_fatal() {
        let err = JobConfig::from_options(JobOptions::default()).expect_err("must fail");
        assert!(matches!(err, ConfigError::MissingActiveGroup));
    }

    #[test]
    fn blank_active_group_is_fatal() {
        let opts = JobOptions {
            active_group: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            JobConfig::from_options(opts),
            Err(ConfigError::MissingActiveGroup)
        ));
    }

    #[test]
    fn defaults_applied() {
        let opts = JobOptions {
            active_group: Some("group.active".into()),
            ..Default::default()
        };
        let config = JobConfig::from_options(opts).expect("valid");
        assert_eq!(config.active_group().as_str(), "group.active");
        assert_eq!(config.interval(), Duration::from_secs(DEFAULT_INTERVAL_SECS));
        assert_eq!(config.off_states().iter().collect::<Vec<_>>(), ["off"]);
        assert_eq!(
            config.exclusions().categories().collect::<Vec<_>>(),
            ["group", "persistent_notification", "zone"]
        );
        assert!(config.on_demand().is_none());
    }

    #[test]
    fn float_off_state_matches_integer_text() {
        let settings = Settings::from_toml(
            "[jobs.power]\nactive_group = \"group.active\"\noff_states = [0.0]\n",
        )
        .expect("settings");
        let opts = settings
            .job_options("power")
            .expect("job")
            .expect("options");
        let config = JobConfig::from_options(opts).expect("valid");

        let snapshot: Snapshot = [
            EntityState::new("sensor.power", "0"),
            EntityState::new("sensor.load", RawState::from(0)),
            EntityState::new("sensor.fan", "0.5"),
        ]
        .into_iter()
        .collect();
        assert_eq!(config.aggregate(&snapshot), vec![EntityId::new("sensor.fan")]);
    }

    #[test]
    fn zero_interval_rejected() {
        let opts = JobOptions {
            active_group: Some("group.active".into()),
            interval: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            JobConfig::from_options(opts),
            Err(ConfigError::InvalidInterval(0))
        ));
    }

    #[test]
    fn optional_fields_union_with_builtins() {
        let opts = JobOptions {
            active_group: Some("group.active".into()),
            off_states: Some(vec!["closed".into(), RawState::from(0)]),
            exclusion_types: Some(vec!["zwave".into()]),
            interval: Some(120),
            on_demand: Some("input_boolean.refresh".into()),
        };
        let config = JobConfig::from_options(opts).expect("valid");
        assert_eq!(config.off_states().iter().collect::<Vec<_>>(), ["0", "closed", "off"]);
        assert!(config.exclusions().is_excluded(&EntityId::new("zwave.stick")));
        assert!(config.exclusions().is_excluded(&EntityId::new("zone.home")));
        assert_eq!(config.interval(), Duration::from_secs(120));
        assert_eq!(
            config.on_demand().map(EntityId::as_str),
            Some("input_boolean.refresh")
        );
    }

    #[test]
    fn config_aggregate_uses_demand_entity() {
        let config = JobConfig::new("group.active").with_on_demand("input_boolean.refresh");
        let snapshot: Snapshot = [EntityState::new("light.a", "on")].into_iter().collect();
        let members: Vec<String> = config
            .aggregate(&snapshot)
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(members, ["input_boolean.refresh", "light.a"]);
    }

    #[test]
    fn settings_parse_multiple_jobs() {
        let toml = r#"
            [jobs.downstairs]
            active_group = "group.active_downstairs"
            off_states = ["off", 0, "closed", false]
            exclusion_types = ["zwave"]
            interval = 120
            on_demand = "input_boolean.demand_active_update"

            [jobs.minimal]
            active_group = "group.active"
        "#;
        let settings = Settings::from_toml(toml).expect("parse");
        assert_eq!(settings.job_names().collect::<Vec<_>>(), ["downstairs", "minimal"]);

        let opts = settings
            .job_options("downstairs")
            .expect("present")
            .expect("valid");
        assert_eq!(opts.interval, Some(120));
        let off = opts.off_states.expect("off states");
        assert_eq!(off[1], RawState::from(0));
        assert_eq!(off[3], RawState::Bool(false));
    }

    #[test]
    fn one_bad_job_does_not_poison_others() {
        let toml = r#"
            [jobs.bad]
            active_group = "group.a"
            interval = -5

            [jobs.good]
            active_group = "group.b"
        "#;
        let settings = Settings::from_toml(toml).expect("parse");
        let results: Vec<(&str, bool)> = settings.jobs().map(|(n, r)| (n, r.is_ok())).collect();
        assert_eq!(results, [("bad", false), ("good", true)]);
    }

    #[test]
    fn unknown_job_key_rejected() {
        let toml = r#"
            [jobs.typo]
            active_grup = "group.a"
        "#;
        let settings = Settings::from_toml(toml).expect("parse");
        let result = settings.job_options("typo").expect("present");
        assert!(matches!(result, Err(ConfigError::InvalidOptions(_))));
    }

    #[test]
    fn unknown_top_level_table_rejected() {
        assert!(matches!(
            Settings::from_toml("[job.x]\nactive_group = \"group.a\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn empty_settings_has_no_jobs() {
        assert!(Settings::from_toml("").expect("parse").is_empty());
    }
}
