//! Configuration errors.

use thiserror::Error;

/// Reasons a job refuses to initialize.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "an active_group must be configured; create the group in the state provider first (it may hold a placeholder such as light.bogus)"
    )]
    MissingActiveGroup,

    #[error("interval must be a positive number of seconds, got {0}")]
    InvalidInterval(u64),

    #[error("invalid job options: {0}")]
    InvalidOptions(#[source] toml::de::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}
