//! Trigger sources: everything that feeds a job's coordinator channel.
//!
//! - `interval`: fixed-period timer, one per job
//! - `events`: fans provider notifications out to the jobs they concern
//! - `watch`: turns states-file changes into provider notifications
//! - `signal`: turns SIGHUP into a restart notification

pub mod events;
pub mod interval;
pub mod signal;
pub mod watch;
