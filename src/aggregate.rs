//! Result assembly and multi-run statistical reduction.
//!
//! `finalize` folds one pass's baseline, final snapshot, and interaction
//! metrics into a [`ProfileResult`]; `average` reduces N such results into
//! per-field mean/min/max/stddev statistics. Serialized field names are the
//! stable contract consumed by downstream reporting and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::scenario::InteractionMetrics;
use crate::snapshot::ResourceSnapshot;

/// Summary heuristics over one profiling pass.
///
/// The efficiency scores are a scoring convention — a 0–100 curve kept
/// stable for cross-target comparability — not a measured physical
/// quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub total_memory_delta_mb: f64,
    pub peak_cpu_percent: f64,
    pub average_cpu_percent: f64,
    pub total_heap_delta_mb: f64,
    pub final_app_memory_mb: f64,
    pub final_app_cpu_percent: f64,
    pub memory_efficiency_score: f64,
    pub cpu_efficiency_score: f64,
}

/// One profiling pass over one target. Written once, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResult {
    pub target_id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub baseline: ResourceSnapshot,
    pub final_snapshot: ResourceSnapshot,
    pub interactions: Vec<InteractionMetrics>,
    pub summary: ProfileSummary,
}

impl ProfileResult {
    /// A failed pass: the failure reason and no partial data.
    pub fn failed(target_id: &str, error: impl Into<String>) -> Self {
        Self {
            target_id: target_id.to_string(),
            timestamp: Utc::now(),
            success: false,
            error: Some(error.into()),
            baseline: ResourceSnapshot::empty(),
            final_snapshot: ResourceSnapshot::empty(),
            interactions: Vec::new(),
            summary: ProfileSummary::default(),
        }
    }
}

/// Assemble one pass's result from its parts.
pub fn finalize(
    target_id: &str,
    baseline: Baseline,
    final_snapshot: ResourceSnapshot,
    interactions: Vec<InteractionMetrics>,
) -> ProfileResult {
    let app_usage = final_snapshot.minus_baseline(&baseline);

    let summary = if interactions.is_empty() {
        ProfileSummary::default()
    } else {
        let total_memory_delta_mb: f64 = interactions.iter().map(|i| i.memory_delta_mb).sum();
        let peak_cpu_percent = interactions
            .iter()
            .map(|i| i.cpu_peak_percent)
            .fold(0.0, f64::max);
        let average_cpu_percent = interactions
            .iter()
            .map(|i| i.cpu_average_percent)
            .sum::<f64>()
            / interactions.len() as f64;
        let total_heap_delta_mb: f64 = interactions.iter().map(|i| i.heap_delta_mb).sum();

        ProfileSummary {
            total_memory_delta_mb,
            peak_cpu_percent,
            average_cpu_percent,
            total_heap_delta_mb,
            final_app_memory_mb: app_usage.memory_mb,
            final_app_cpu_percent: app_usage.cpu_percent,
            memory_efficiency_score: efficiency_score(app_usage.memory_mb, total_memory_delta_mb),
            cpu_efficiency_score: efficiency_score(average_cpu_percent, peak_cpu_percent),
        }
    };

    ProfileResult {
        target_id: target_id.to_string(),
        timestamp: Utc::now(),
        success: true,
        error: None,
        baseline,
        final_snapshot,
        interactions,
        summary,
    }
}

/// 0–100 heuristic: a lower delta relative to its base scores higher
/// (`100 − ratio×30`, clamped). A base of zero cannot form a ratio: a
/// zero delta maps to a fixed high score, any other delta to a fixed
/// moderate one.
pub fn efficiency_score(base: f64, delta: f64) -> f64 {
    if base <= 0.0 {
        return if delta <= 0.0 { 95.0 } else { 70.0 };
    }
    (100.0 - (delta / base) * 30.0).clamp(0.0, 100.0)
}

// ── Multi-run statistics ────────────────────────────────────────────────────

/// Per-field statistics over the successful executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

impl FieldStats {
    /// Mean/min/max and sample standard deviation (N−1 denominator, zero
    /// when N ≤ 1).
    pub fn over(values: &[f64]) -> FieldStats {
        if values.is_empty() {
            return FieldStats::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let stddev = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        FieldStats {
            mean,
            min,
            max,
            stddev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub memory_mb: FieldStats,
    pub cpu_percent: FieldStats,
    pub process_count: FieldStats,
    pub browser_heap_used_mb: FieldStats,
    pub browser_heap_total_mb: FieldStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionStats {
    pub name: String,
    /// Successful executions that included this scenario.
    pub runs: u32,
    pub duration_s: FieldStats,
    pub memory_delta_mb: FieldStats,
    pub cpu_peak_percent: FieldStats,
    pub cpu_average_percent: FieldStats,
    pub heap_delta_mb: FieldStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_memory_delta_mb: FieldStats,
    pub peak_cpu_percent: FieldStats,
    pub average_cpu_percent: FieldStats,
    pub total_heap_delta_mb: FieldStats,
    pub final_app_memory_mb: FieldStats,
    pub final_app_cpu_percent: FieldStats,
    pub memory_efficiency_score: FieldStats,
    pub cpu_efficiency_score: FieldStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTally {
    pub successful: u32,
    pub failed: u32,
}

/// Statistical reduction of N independent executions against one target.
/// Scenario names are copied; every scalar field becomes [`FieldStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AveragedProfileResult {
    pub target_id: String,
    pub executions: ExecutionTally,
    pub baseline: SnapshotStats,
    pub final_snapshot: SnapshotStats,
    pub interactions: Vec<InteractionStats>,
    pub summary: SummaryStats,
}

/// Either a statistical average, or — when every execution failed — the
/// first captured failure verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProfileOutcome {
    Averaged(AveragedProfileResult),
    Failed(ProfileResult),
}

/// Merge repeated executions of one target.
///
/// Failed runs are tallied but contribute no numeric values. When no run
/// succeeded, the first failure is returned as-is instead of a synthesized
/// average.
pub fn average(results: Vec<ProfileResult>) -> ProfileOutcome {
    let tally = ExecutionTally {
        successful: results.iter().filter(|r| r.success).count() as u32,
        failed: results.iter().filter(|r| !r.success).count() as u32,
    };
    let ok: Vec<&ProfileResult> = results.iter().filter(|r| r.success).collect();
    if ok.is_empty() {
        let first = results
            .into_iter()
            .next()
            .unwrap_or_else(|| ProfileResult::failed("", "no executions recorded"));
        return ProfileOutcome::Failed(first);
    }

    let target_id = ok[0].target_id.clone();
    let baseline = snapshot_stats(&ok.iter().map(|r| &r.baseline).collect::<Vec<_>>());
    let final_snapshot = snapshot_stats(&ok.iter().map(|r| &r.final_snapshot).collect::<Vec<_>>());

    // Scenario order follows first appearance; a run that dropped a
    // scenario simply contributes nothing to that scenario's statistics.
    let mut names: Vec<&str> = Vec::new();
    for run in &ok {
        for interaction in &run.interactions {
            if !names.contains(&interaction.name.as_str()) {
                names.push(&interaction.name);
            }
        }
    }
    let interactions = names
        .iter()
        .map(|name| {
            let members: Vec<&InteractionMetrics> = ok
                .iter()
                .flat_map(|r| r.interactions.iter())
                .filter(|i| i.name == *name)
                .collect();
            let field = |get: fn(&InteractionMetrics) -> f64| {
                FieldStats::over(&members.iter().map(|m| get(m)).collect::<Vec<_>>())
            };
            InteractionStats {
                name: name.to_string(),
                runs: members.len() as u32,
                duration_s: field(|m| m.duration_s),
                memory_delta_mb: field(|m| m.memory_delta_mb),
                cpu_peak_percent: field(|m| m.cpu_peak_percent),
                cpu_average_percent: field(|m| m.cpu_average_percent),
                heap_delta_mb: field(|m| m.heap_delta_mb),
            }
        })
        .collect();

    let field = |get: fn(&ProfileSummary) -> f64| {
        FieldStats::over(&ok.iter().map(|r| get(&r.summary)).collect::<Vec<_>>())
    };
    let summary = SummaryStats {
        total_memory_delta_mb: field(|s| s.total_memory_delta_mb),
        peak_cpu_percent: field(|s| s.peak_cpu_percent),
        average_cpu_percent: field(|s| s.average_cpu_percent),
        total_heap_delta_mb: field(|s| s.total_heap_delta_mb),
        final_app_memory_mb: field(|s| s.final_app_memory_mb),
        final_app_cpu_percent: field(|s| s.final_app_cpu_percent),
        memory_efficiency_score: field(|s| s.memory_efficiency_score),
        cpu_efficiency_score: field(|s| s.cpu_efficiency_score),
    };

    ProfileOutcome::Averaged(AveragedProfileResult {
        target_id,
        executions: tally,
        baseline,
        final_snapshot,
        interactions,
        summary,
    })
}

fn snapshot_stats(snapshots: &[&ResourceSnapshot]) -> SnapshotStats {
    let field = |get: fn(&ResourceSnapshot) -> f64| {
        FieldStats::over(&snapshots.iter().map(|s| get(s)).collect::<Vec<_>>())
    };
    SnapshotStats {
        memory_mb: field(|s| s.memory_mb),
        cpu_percent: field(|s| s.cpu_percent),
        process_count: field(|s| f64::from(s.process_count)),
        browser_heap_used_mb: field(|s| s.browser_heap_used_mb),
        browser_heap_total_mb: field(|s| s.browser_heap_total_mb),
    }
}
