//! Idle-baseline calibration.
//!
//! An idle browser is not quiet: JIT warm-up, GC, and background tasks
//! produce memory and CPU readings that would swamp the small deltas
//! attributable to the page under test. The calibrator averages repeated
//! idle samples into a stable noise floor that the rest of the pass
//! subtracts from its readings.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::sampler::ProcessSampler;
use crate::snapshot::{ResourceSnapshot, unix_now};

/// Averaged idle-state usage. Created once per profiling pass, before any
/// interaction sampling, and read-only thereafter.
pub type Baseline = ResourceSnapshot;

/// Fewer samples than this and the average is too jittery to subtract.
const MIN_SAMPLES: usize = 3;

pub struct BaselineCalibrator {
    samples: usize,
    interval: Duration,
}

impl Default for BaselineCalibrator {
    fn default() -> Self {
        Self::new(MIN_SAMPLES, Duration::from_millis(500))
    }
}

impl BaselineCalibrator {
    /// `samples` is clamped up to the minimum of 3.
    pub fn new(samples: usize, interval: Duration) -> Self {
        Self {
            samples: samples.max(MIN_SAMPLES),
            interval,
        }
    }

    /// Average repeated idle snapshots into a baseline.
    pub async fn calibrate(&self, sampler: &mut ProcessSampler) -> Baseline {
        let mut taken = Vec::with_capacity(self.samples);
        for i in 0..self.samples {
            let sample = sampler.sample().await;
            debug!(
                sample = i + 1,
                memory_mb = sample.memory_mb,
                cpu_percent = sample.cpu_percent,
                processes = sample.process_count,
                "baseline sample"
            );
            taken.push(sample);
            if i + 1 < self.samples {
                sleep(self.interval).await;
            }
        }

        let n = taken.len() as f64;
        ResourceSnapshot {
            timestamp: unix_now(),
            memory_mb: taken.iter().map(|s| s.memory_mb).sum::<f64>() / n,
            cpu_percent: taken.iter().map(|s| s.cpu_percent).sum::<f64>() / n,
            process_count: (taken.iter().map(|s| f64::from(s.process_count)).sum::<f64>() / n)
                .round() as u32,
            browser_heap_used_mb: 0.0,
            browser_heap_total_mb: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_is_clamped_to_minimum() {
        let calibrator = BaselineCalibrator::new(1, Duration::from_millis(1));
        assert_eq!(calibrator.samples, 3);
    }

    #[tokio::test]
    async fn calibrating_a_dead_target_averages_to_zero() {
        let mut sampler = ProcessSampler::for_pid(4_194_304)
            .with_cpu_interval(Duration::from_millis(5));
        let calibrator = BaselineCalibrator::new(3, Duration::from_millis(5));
        let baseline = calibrator.calibrate(&mut sampler).await;
        assert_eq!(baseline.memory_mb, 0.0);
        assert_eq!(baseline.cpu_percent, 0.0);
        assert_eq!(baseline.process_count, 0);
    }
}
