//! activeset-provider: state provider IO boundary.
//! Provides the provider capability trait, push-notification shapes, an
//! in-memory provider and a JSON-file provider. No aggregation logic.

pub mod error;
pub mod file;
pub mod memory;
pub mod provider;

pub use error::ProviderError;
pub use file::{FileProvider, load_snapshot};
pub use memory::{MemoryProvider, ProviderWrite};
pub use provider::{ProviderEvent, StateProvider, diff_snapshots};
