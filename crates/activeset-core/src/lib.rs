//! activeset-core: derives the "active set" membership list from a full
//! state snapshot.
//!
//! Pure library. No tokio, no IO: everything here is a function of the
//! snapshot and the immutable [`config::JobConfig`].

pub mod aggregate;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod normalize;
pub mod types;

pub use aggregate::aggregate;
pub use config::{DEFAULT_INTERVAL_SECS, JobConfig, JobOptions, Settings};
pub use error::ConfigError;
pub use exclusion::{BUILTIN_EXCLUSIONS, ExclusionFilter};
pub use normalize::{ACTIVE_TOKEN, INACTIVE_TOKEN, Normalizer, OffStates};
pub use types::{Activity, EntityId, EntityState, RawState, Snapshot};
