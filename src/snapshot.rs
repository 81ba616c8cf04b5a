//! Point-in-time resource measurements and baseline arithmetic.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current Unix time as fractional seconds.
pub(crate) fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Single point-in-time resource measurement for a process tree.
///
/// OS-level figures (`memory_mb`, `cpu_percent`, `process_count`) come from
/// the process table; the `browser_heap_*` figures come from the
/// remote-debugging connection and stay zero when it is unavailable.
///
/// `process_count == 0` is the valid "target not found" reading, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Unix timestamp (fractional seconds) when the sample was taken.
    pub timestamp: f64,
    /// Summed resident-set size across matched processes, in MB.
    pub memory_mb: f64,
    /// Summed CPU usage across matched processes, in percent.
    pub cpu_percent: f64,
    /// Matched processes still alive at measurement time.
    pub process_count: u32,
    /// Script-engine heap in use, in MB.
    pub browser_heap_used_mb: f64,
    /// Script-engine heap reserved, in MB.
    pub browser_heap_total_mb: f64,
}

impl ResourceSnapshot {
    /// An all-zero reading stamped with the current time.
    pub fn empty() -> Self {
        Self::now(0.0, 0.0, 0)
    }

    /// A fresh OS-level reading with no heap data yet.
    pub fn now(memory_mb: f64, cpu_percent: f64, process_count: u32) -> Self {
        Self {
            timestamp: unix_now(),
            memory_mb,
            cpu_percent,
            process_count,
            browser_heap_used_mb: 0.0,
            browser_heap_total_mb: 0.0,
        }
    }

    /// Attach heap figures reported over the debug connection.
    pub fn with_heap(mut self, used_mb: f64, total_mb: f64) -> Self {
        self.browser_heap_used_mb = used_mb;
        self.browser_heap_total_mb = total_mb;
        self
    }

    /// Usage attributable to the application: this reading minus the idle
    /// baseline. Deltas never go negative; a reading below the baseline
    /// clamps to zero.
    pub fn minus_baseline(&self, baseline: &ResourceSnapshot) -> ResourceSnapshot {
        ResourceSnapshot {
            timestamp: self.timestamp,
            memory_mb: (self.memory_mb - baseline.memory_mb).max(0.0),
            cpu_percent: (self.cpu_percent - baseline.cpu_percent).max(0.0),
            process_count: self.process_count.saturating_sub(baseline.process_count),
            browser_heap_used_mb: self.browser_heap_used_mb,
            browser_heap_total_mb: self.browser_heap_total_mb,
        }
    }
}
