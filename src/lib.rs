//! webgauge — resource and performance profiling for web applications.
//!
//! Measures OS-level process-tree usage (via the system process table) and
//! in-browser script-heap usage (via the remote-debugging protocol) of one
//! running web application under a fixed sequence of synthetic interaction
//! scenarios, subtracts a calibrated idle baseline, and reduces repeated
//! executions into per-field statistics.
//!
//! All figures are relative, baseline-subtracted estimates meant for
//! comparing targets against each other, not calibrated hardware metrics.

pub mod aggregate;
pub mod baseline;
pub mod config;
pub mod devtools;
pub mod error;
pub mod profiler;
pub mod progress;
pub mod sampler;
pub mod sandbox;
pub mod scenario;
pub mod snapshot;

// Re-export the surface most callers need at the crate root.
pub use aggregate::{AveragedProfileResult, ProfileOutcome, ProfileResult};
pub use error::ProfileError;
pub use profiler::{Profiler, TargetSpec};
pub use snapshot::ResourceSnapshot;
