//! Stage-transition reporting.
//!
//! A reporter is passed by reference into the profiling pass and told about
//! discrete named stage transitions. Callers decide what that becomes —
//! log lines, a progress bar, or nothing.

use std::fmt;

use tracing::info;

/// Discrete stages of one profiling pass, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LaunchingSandbox,
    CalibratingBaseline,
    ConnectingDevtools,
    LoadingApplication,
    RunningScenario(&'static str),
    Finalizing,
    TearingDown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LaunchingSandbox => write!(f, "launching sandbox"),
            Stage::CalibratingBaseline => write!(f, "calibrating baseline"),
            Stage::ConnectingDevtools => write!(f, "connecting devtools"),
            Stage::LoadingApplication => write!(f, "loading application"),
            Stage::RunningScenario(name) => write!(f, "running scenario: {name}"),
            Stage::Finalizing => write!(f, "finalizing"),
            Stage::TearingDown => write!(f, "tearing down"),
        }
    }
}

/// Receives stage transitions for one target's pass.
pub trait ProgressReporter: Send + Sync {
    fn stage(&self, target_id: &str, stage: Stage);
}

/// Discards every transition.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn stage(&self, _target_id: &str, _stage: Stage) {}
}

/// Emits each transition as a tracing event.
pub struct TraceReporter;

impl ProgressReporter for TraceReporter {
    fn stage(&self, target_id: &str, stage: Stage) {
        info!(id = target_id, stage = %stage, "profiling stage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        stages: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn stage(&self, _target_id: &str, stage: Stage) {
            self.stages.lock().unwrap().push(stage.to_string());
        }
    }

    #[test]
    fn reporter_sees_transitions_in_order() {
        let reporter = RecordingReporter::default();
        reporter.stage("app", Stage::LaunchingSandbox);
        reporter.stage("app", Stage::RunningScenario("Initial Load"));
        reporter.stage("app", Stage::TearingDown);
        assert_eq!(
            *reporter.stages.lock().unwrap(),
            vec![
                "launching sandbox",
                "running scenario: Initial Load",
                "tearing down"
            ]
        );
    }
}
