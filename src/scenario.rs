//! Fixed interaction scenarios and their reduction to metrics.
//!
//! The scenario set and its order are fixed, not data-driven: results only
//! stay comparable across targets if every target runs the same synthetic
//! workloads in the same sequence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use crate::baseline::Baseline;
use crate::devtools::{HeapUsage, ProtocolClient};
use crate::sampler::ProcessSampler;
use crate::snapshot::{ResourceSnapshot, unix_now};

/// Memory spreads under this are sampling noise; sustained usage above the
/// baseline is reported instead.
const MEMORY_NOISE_FLOOR_MB: f64 = 1.0;
/// Same idea for the script heap, which is much less noisy.
const HEAP_NOISE_FLOOR_MB: f64 = 0.1;

/// Resource usage attributed to one scenario. Owns its ordered samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionMetrics {
    pub name: String,
    pub duration_s: f64,
    pub memory_delta_mb: f64,
    pub cpu_peak_percent: f64,
    pub cpu_average_percent: f64,
    pub heap_delta_mb: f64,
    pub samples: Vec<ResourceSnapshot>,
}

impl InteractionMetrics {
    /// Reduce a sample run to one metrics record.
    ///
    /// `memory_delta_mb` is the max−min spread of sampled memory unless it
    /// falls under the noise floor, in which case the average above the idle
    /// baseline (clamped at zero) is reported. The heap delta follows the
    /// same rule over the samples that actually carried heap data, falling
    /// back to their plain average.
    pub fn from_samples(
        name: &str,
        started_at: f64,
        samples: Vec<ResourceSnapshot>,
        baseline: &Baseline,
    ) -> Self {
        let duration_s = (unix_now() - started_at).max(0.0);
        if samples.is_empty() {
            return Self {
                name: name.to_string(),
                duration_s,
                memory_delta_mb: 0.0,
                cpu_peak_percent: 0.0,
                cpu_average_percent: 0.0,
                heap_delta_mb: 0.0,
                samples,
            };
        }

        let memory: Vec<f64> = samples.iter().map(|s| s.memory_mb).collect();
        let mut memory_delta_mb = fmax(&memory) - fmin(&memory);
        if memory_delta_mb < MEMORY_NOISE_FLOOR_MB {
            memory_delta_mb = (fmean(&memory) - baseline.memory_mb).max(0.0);
        }

        let cpu: Vec<f64> = samples.iter().map(|s| s.cpu_percent).collect();

        let heap: Vec<f64> = samples
            .iter()
            .map(|s| s.browser_heap_used_mb)
            .filter(|v| *v > 0.0)
            .collect();
        let heap_delta_mb = if heap.is_empty() {
            0.0
        } else {
            let spread = fmax(&heap) - fmin(&heap);
            if spread < HEAP_NOISE_FLOOR_MB {
                fmean(&heap)
            } else {
                spread
            }
        };

        Self {
            name: name.to_string(),
            duration_s,
            memory_delta_mb,
            cpu_peak_percent: fmax(&cpu),
            cpu_average_percent: fmean(&cpu),
            heap_delta_mb,
            samples,
        }
    }
}

/// The fixed synthetic workloads, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Page load settling; one busy-loop warm-up, then pure observation.
    InitialLoad,
    /// Repeated query-and-render churn.
    SearchBurst,
    /// DOM mutation and style churn.
    UiInteractions,
    /// Large short-lived allocations.
    MemoryStress,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::InitialLoad,
        Scenario::SearchBurst,
        Scenario::UiInteractions,
        Scenario::MemoryStress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::InitialLoad => "Initial Load",
            Scenario::SearchBurst => "Search Burst",
            Scenario::UiInteractions => "UI Interactions",
            Scenario::MemoryStress => "Memory Stress",
        }
    }

    fn rounds(self) -> usize {
        3
    }

    fn pause(self) -> Duration {
        match self {
            Scenario::InitialLoad | Scenario::UiInteractions => Duration::from_millis(500),
            Scenario::SearchBurst => Duration::from_millis(400),
            Scenario::MemoryStress => Duration::from_secs(1),
        }
    }

    /// Synthetic script for one round, or `None` for pure settling.
    fn workload(self, round: usize) -> Option<String> {
        match self {
            Scenario::InitialLoad => (round == 0)
                .then(|| "for (let i = 0; i < 100000; i++) { Math.random(); }".to_string()),
            Scenario::SearchBurst => Some(format!(
                "document.body.innerHTML += '<div>query {round}</div>'; \
                 for (let i = 0; i < 50000; i++) {{ Math.sin(i); }}"
            )),
            Scenario::UiInteractions => Some(format!(
                "document.body.style.backgroundColor = 'hsl({}, 50%, 95%)'; \
                 for (let j = 0; j < 30000; j++) {{ document.createElement('span'); }}",
                round * 120
            )),
            Scenario::MemoryStress => Some(format!(
                "let arr{round} = new Array(100000).fill(0).map((_, idx) => \
                 Math.random() * idx); arr{round}.sort();"
            )),
        }
    }
}

/// Drives the fixed scenarios against one target, sampling both domains.
pub struct InteractionProfiler<'a> {
    sampler: &'a mut ProcessSampler,
    baseline: Baseline,
}

impl<'a> InteractionProfiler<'a> {
    pub fn new(sampler: &'a mut ProcessSampler, baseline: Baseline) -> Self {
        Self { sampler, baseline }
    }

    /// Run one scenario: per round, optionally push the synthetic workload
    /// through the page, then take one snapshot merged with heap data when
    /// the connection has any.
    ///
    /// A failed workload evaluation degrades that round to pure
    /// observation; a dead connection drops `client` to `None` so the rest
    /// of the pass runs OS-level only.
    pub async fn run_scenario(
        &mut self,
        scenario: Scenario,
        client: &mut Option<ProtocolClient>,
    ) -> InteractionMetrics {
        let started_at = unix_now();
        let mut samples = Vec::with_capacity(scenario.rounds());

        for round in 0..scenario.rounds() {
            if let (Some(c), Some(js)) = (client.as_mut(), scenario.workload(round)) {
                if let Err(err) = c.evaluate(&js).await {
                    debug!(
                        scenario = scenario.name(),
                        round,
                        error = %err,
                        "workload evaluation failed"
                    );
                    if err.is_connection_dead() {
                        *client = None;
                    }
                }
            }

            let mut sample = self.sampler.sample().await;
            let heap = heap_of(client).await;
            if heap.connection_working {
                sample = sample.with_heap(heap.heap_used_mb, heap.heap_total_mb);
            }
            samples.push(sample);

            if round + 1 < scenario.rounds() {
                sleep(scenario.pause()).await;
            }
        }

        InteractionMetrics::from_samples(scenario.name(), started_at, samples, &self.baseline)
    }
}

/// Heap figures from an optional connection; absence is the degraded state.
async fn heap_of(client: &mut Option<ProtocolClient>) -> HeapUsage {
    match client.as_mut() {
        Some(c) => c.heap_usage().await,
        None => HeapUsage::unavailable(),
    }
}

fn fmin(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fmax(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn fmean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(memory_mb: f64, cpu_percent: f64) -> ResourceSnapshot {
        ResourceSnapshot::now(memory_mb, cpu_percent, 10)
    }

    #[test]
    fn memory_delta_is_spread_when_above_noise_floor() {
        let baseline = snap(100.0, 0.0);
        let samples = vec![snap(100.0, 2.0), snap(105.0, 8.0), snap(110.0, 4.0)];
        let metrics =
            InteractionMetrics::from_samples("Search Burst", unix_now(), samples, &baseline);
        assert_eq!(metrics.memory_delta_mb, 10.0);
        assert_eq!(metrics.heap_delta_mb, 0.0);
        assert_eq!(metrics.cpu_peak_percent, 8.0);
        assert!((metrics.cpu_average_percent - 14.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn small_spread_falls_back_to_average_above_baseline() {
        let baseline = snap(100.0, 0.0);
        let samples = vec![snap(103.0, 1.0), snap(103.2, 1.0), snap(103.4, 1.0)];
        let metrics =
            InteractionMetrics::from_samples("Initial Load", unix_now(), samples, &baseline);
        // Spread 0.4 MB is noise; average 103.2 sits 3.2 MB over baseline.
        assert!((metrics.memory_delta_mb - 3.2).abs() < 1e-9);
    }

    #[test]
    fn below_baseline_fallback_clamps_to_zero() {
        let baseline = snap(100.0, 0.0);
        let samples = vec![snap(99.0, 0.0), snap(99.0, 0.0), snap(99.0, 0.0)];
        let metrics =
            InteractionMetrics::from_samples("Initial Load", unix_now(), samples, &baseline);
        assert_eq!(metrics.memory_delta_mb, 0.0);
    }

    #[test]
    fn heap_delta_only_counts_samples_with_heap_data() {
        let baseline = snap(0.0, 0.0);
        let samples = vec![
            snap(50.0, 1.0).with_heap(8.0, 32.0),
            snap(52.0, 1.0),
            snap(55.0, 1.0).with_heap(14.0, 32.0),
        ];
        let metrics =
            InteractionMetrics::from_samples("Memory Stress", unix_now(), samples, &baseline);
        assert_eq!(metrics.heap_delta_mb, 6.0);
    }

    #[test]
    fn tiny_heap_spread_reports_average_usage() {
        let baseline = snap(0.0, 0.0);
        let samples = vec![
            snap(50.0, 1.0).with_heap(8.0, 32.0),
            snap(50.0, 1.0).with_heap(8.02, 32.0),
        ];
        let metrics =
            InteractionMetrics::from_samples("UI Interactions", unix_now(), samples, &baseline);
        assert!((metrics.heap_delta_mb - 8.01).abs() < 1e-9);
    }

    #[test]
    fn empty_sample_run_is_all_zeros() {
        let baseline = snap(100.0, 5.0);
        let metrics =
            InteractionMetrics::from_samples("Initial Load", unix_now(), Vec::new(), &baseline);
        assert_eq!(metrics.memory_delta_mb, 0.0);
        assert_eq!(metrics.cpu_peak_percent, 0.0);
        assert_eq!(metrics.heap_delta_mb, 0.0);
        assert!(metrics.samples.is_empty());
    }

    #[tokio::test]
    async fn scenario_without_connection_runs_os_level_only() {
        let mut sampler = crate::sampler::ProcessSampler::for_pid(4_194_304)
            .with_cpu_interval(Duration::from_millis(5));
        let baseline = ResourceSnapshot::empty();
        let mut profiler = InteractionProfiler::new(&mut sampler, baseline);
        let mut client = None;
        let metrics = profiler
            .run_scenario(Scenario::SearchBurst, &mut client)
            .await;
        assert_eq!(metrics.samples.len(), 3);
        assert!(
            metrics
                .samples
                .iter()
                .all(|s| s.browser_heap_used_mb == 0.0)
        );
        assert_eq!(metrics.heap_delta_mb, 0.0);
    }

    #[test]
    fn scenario_order_is_fixed() {
        let names: Vec<&str> = Scenario::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["Initial Load", "Search Burst", "UI Interactions", "Memory Stress"]
        );
    }
}
