//! Result-contract integration tests.
//!
//! The serialized ProfileResult / AveragedProfileResult shapes are consumed
//! by downstream reporting; these tests pin the field names and the
//! statistical reduction behind them.

use webgauge::aggregate::{self, FieldStats, ProfileOutcome, ProfileResult};
use webgauge::scenario::InteractionMetrics;
use webgauge::snapshot::ResourceSnapshot;

fn sample_run(target: &str, memory_mb: f64) -> ProfileResult {
    let baseline = ResourceSnapshot::now(memory_mb - 50.0, 2.0, 10);
    let samples = vec![
        ResourceSnapshot::now(memory_mb, 4.0, 12).with_heap(8.0, 32.0),
        ResourceSnapshot::now(memory_mb + 10.0, 9.0, 12).with_heap(14.0, 32.0),
        ResourceSnapshot::now(memory_mb + 4.0, 6.0, 12).with_heap(11.0, 32.0),
    ];
    let started_at = samples[0].timestamp;
    let interaction =
        InteractionMetrics::from_samples("Initial Load", started_at, samples, &baseline);
    let final_snapshot = ResourceSnapshot::now(memory_mb + 4.0, 5.0, 12);
    aggregate::finalize(target, baseline, final_snapshot, vec![interaction])
}

mod profile_result_shape {
    use super::*;

    #[test]
    fn field_names_match_the_reporting_contract() {
        let result = sample_run("svelte", 400.0);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["target_id"], "svelte");
        assert!(value["success"].as_bool().unwrap());
        assert!(value.get("error").is_none());

        let baseline = &value["baseline"];
        for field in [
            "timestamp",
            "memory_mb",
            "cpu_percent",
            "process_count",
            "browser_heap_used_mb",
            "browser_heap_total_mb",
        ] {
            assert!(baseline.get(field).is_some(), "baseline missing {field}");
        }

        let interaction = &value["interactions"][0];
        for field in [
            "name",
            "duration_s",
            "memory_delta_mb",
            "cpu_peak_percent",
            "cpu_average_percent",
            "heap_delta_mb",
            "samples",
        ] {
            assert!(
                interaction.get(field).is_some(),
                "interaction missing {field}"
            );
        }

        let summary = &value["summary"];
        for field in [
            "total_memory_delta_mb",
            "peak_cpu_percent",
            "average_cpu_percent",
            "total_heap_delta_mb",
            "final_app_memory_mb",
            "final_app_cpu_percent",
            "memory_efficiency_score",
            "cpu_efficiency_score",
        ] {
            assert!(summary.get(field).is_some(), "summary missing {field}");
        }
    }

    #[test]
    fn snapshots_never_report_negative_usage() {
        let result = sample_run("app", 300.0);
        for snapshot in result
            .interactions
            .iter()
            .flat_map(|i| i.samples.iter())
            .chain([&result.baseline, &result.final_snapshot])
        {
            assert!(snapshot.memory_mb >= 0.0);
            assert!(snapshot.cpu_percent >= 0.0);
        }
    }

    #[test]
    fn failed_result_serializes_its_error() {
        let result = ProfileResult::failed("app", "sandbox launch failed");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "sandbox launch failed");
        assert!(value["interactions"].as_array().unwrap().is_empty());
    }
}

mod averaging {
    use super::*;

    #[test]
    fn single_run_reproduces_values_exactly() {
        let run = sample_run("app", 400.0);
        let peak = run.summary.peak_cpu_percent;
        let ProfileOutcome::Averaged(avg) = aggregate::average(vec![run]) else {
            panic!("expected averaged outcome");
        };
        let stats = avg.summary.peak_cpu_percent;
        assert_eq!(stats.mean, peak);
        assert_eq!(stats.min, peak);
        assert_eq!(stats.max, peak);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn two_runs_produce_expected_statistics() {
        let stats = FieldStats::over(&[10.0, 20.0]);
        assert_eq!(stats.mean, 15.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 20.0);
        assert!((stats.stddev - 7.0710678).abs() < 1e-6);
    }

    #[test]
    fn three_executions_with_one_failure() {
        let runs = vec![
            sample_run("app", 300.0),
            ProfileResult::failed("app", "devtools unreachable"),
            sample_run("app", 500.0),
        ];
        let ProfileOutcome::Averaged(avg) = aggregate::average(runs) else {
            panic!("expected averaged outcome");
        };
        assert_eq!(avg.executions.successful, 2);
        assert_eq!(avg.executions.failed, 1);
        // Statistics span only the two successes.
        assert_eq!(avg.final_snapshot.memory_mb.min, 304.0);
        assert_eq!(avg.final_snapshot.memory_mb.max, 504.0);
    }

    #[test]
    fn all_failed_returns_first_failure_verbatim() {
        let runs = vec![
            ProfileResult::failed("app", "first failure"),
            ProfileResult::failed("app", "second failure"),
        ];
        let ProfileOutcome::Failed(result) = aggregate::average(runs) else {
            panic!("expected the failure back");
        };
        assert_eq!(result.error.as_deref(), Some("first failure"));
    }

    #[test]
    fn averaged_shape_carries_stats_per_field() {
        let runs = vec![sample_run("app", 300.0), sample_run("app", 500.0)];
        let ProfileOutcome::Averaged(avg) = aggregate::average(runs) else {
            panic!("expected averaged outcome");
        };
        let value = serde_json::to_value(&avg).unwrap();

        assert_eq!(value["target_id"], "app");
        assert_eq!(value["executions"]["successful"], 2);
        assert_eq!(value["executions"]["failed"], 0);
        for field in ["mean", "min", "max", "stddev"] {
            assert!(value["summary"]["memory_efficiency_score"]
                .get(field)
                .is_some());
            assert!(value["baseline"]["memory_mb"].get(field).is_some());
        }
        // Scenario names are copied, not averaged.
        assert_eq!(value["interactions"][0]["name"], "Initial Load");
    }
}
