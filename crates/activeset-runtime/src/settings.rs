//! Settings file loading and per-job validation.
//!
//! Each `[jobs.<name>]` table is validated on its own: a broken job is
//! logged and skipped while the others start normally.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use activeset_core::{ConfigError, DEFAULT_INTERVAL_SECS, JobConfig, JobOptions, Settings};
use anyhow::Context;
use serde::Serialize;

/// A validated job ready to be hosted.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub config: Arc<JobConfig>,
}

/// Result of validating every selected job.
#[derive(Debug, Default)]
pub struct BuiltJobs {
    pub jobs: Vec<JobSpec>,
    pub failures: Vec<(String, ConfigError)>,
}

pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    Settings::from_toml(&content)
        .with_context(|| format!("invalid settings file {}", path.display()))
}

/// Validate the jobs of `settings`, or only the one named `only`.
///
/// Fails only when `only` names a job that does not exist.
pub fn build_jobs(settings: &Settings, only: Option<&str>) -> anyhow::Result<BuiltJobs> {
    let selected: Vec<(&str, Result<JobOptions, ConfigError>)> = match only {
        Some(name) => {
            let options = settings
                .job_options(name)
                .with_context(|| format!("no job named {name:?} in settings"))?;
            vec![(name, options)]
        }
        None => settings.jobs().collect(),
    };

    let mut built = BuiltJobs::default();
    for (name, options) in selected {
        match options.and_then(|opts| JobConfig::from_options(opts.clone()).map(|c| (opts, c))) {
            Ok((opts, config)) => {
                log_effective(name, &opts, &config);
                built.jobs.push(JobSpec {
                    name: name.to_string(),
                    config: Arc::new(config),
                });
            }
            Err(e) => {
                tracing::error!(job = %name, "job not started: {e}");
                built.failures.push((name.to_string(), e));
            }
        }
    }
    Ok(built)
}

fn log_effective(name: &str, opts: &JobOptions, config: &JobConfig) {
    if opts.interval.is_none() {
        tracing::info!(job = %name, "interval not set, using default of {DEFAULT_INTERVAL_SECS}s");
    }
    if opts.off_states.is_none() {
        tracing::info!(job = %name, "off_states not set, only \"off\" counts as inactive");
    }
    if opts.exclusion_types.is_none() {
        tracing::info!(job = %name, "exclusion_types not set, using built-in exclusions only");
    }
    let effective = EffectiveConfig::from(config);
    tracing::info!(
        job = %name,
        group = %effective.active_group,
        interval_secs = effective.interval_secs,
        off_states = ?effective.off_states,
        exclusion_types = ?effective.exclusion_types,
        on_demand = ?effective.on_demand,
        "job configured"
    );
}

// ─── Effective configuration report ───────────────────────────────

/// Printable view of a [`JobConfig`] with every default filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub active_group: String,
    pub interval_secs: u64,
    pub off_states: Vec<String>,
    pub exclusion_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_demand: Option<String>,
}

impl From<&JobConfig> for EffectiveConfig {
    fn from(config: &JobConfig) -> Self {
        Self {
            active_group: config.active_group().to_string(),
            interval_secs: config.interval().as_secs(),
            off_states: config.off_states().iter().map(str::to_string).collect(),
            exclusion_types: config.exclusions().categories().map(str::to_string).collect(),
            on_demand: config.on_demand().map(ToString::to_string),
        }
    }
}

/// Per-job line of the `check` report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckEntry {
    Ok(EffectiveConfig),
    Error(String),
}

/// Validate every job and render the report. Returns the report and
/// whether every job is valid.
pub fn check_report(settings: &Settings) -> (BTreeMap<String, CheckEntry>, bool) {
    let mut report = BTreeMap::new();
    let mut all_valid = true;
    for (name, options) in settings.jobs() {
        let entry = match options.and_then(JobConfig::from_options) {
            Ok(config) => CheckEntry::Ok(EffectiveConfig::from(&config)),
            Err(e) => {
                all_valid = false;
                CheckEntry::Error(e.to_string())
            }
        };
        report.insert(name.to_string(), entry);
    }
    (report, all_valid)
}

/// `activeset check`: print the report as JSON; non-zero exit if any job
/// is invalid or none is configured.
pub fn cmd_check(path: &Path) -> anyhow::Result<()> {
    let settings = load_settings(path)?;
    let (report, all_valid) = check_report(&settings);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if settings.is_empty() {
        anyhow::bail!("no jobs configured in {}", path.display());
    }
    if !all_valid {
        anyhow::bail!("one or more jobs are invalid");
    }
    Ok(())
}
