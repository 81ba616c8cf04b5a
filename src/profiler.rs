//! One profiling pass per target, repeated and averaged.
//!
//! Control flow: sandbox launch → baseline calibration → devtools
//! connect + navigate → fixed scenario sequence → final snapshot →
//! aggregation. Targets run strictly sequentially: OS-level sampling scopes
//! usage by the sandbox's root PID, and overlapping sandboxes would
//! misattribute it.
//!
//! The pass exclusively owns its socket connection and sandboxed process.
//! Teardown order is fixed — close the connection, terminate the process,
//! remove the profile directory — with each step guarded so a failure never
//! skips the next.

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::aggregate::{self, ProfileOutcome, ProfileResult};
use crate::baseline::BaselineCalibrator;
use crate::config::ProfilerConfig;
use crate::devtools::ProtocolClient;
use crate::progress::{ProgressReporter, Stage};
use crate::sampler::ProcessSampler;
use crate::sandbox::SandboxLauncher;
use crate::scenario::{InteractionProfiler, Scenario};

/// One named URL to profile.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub id: String,
    pub url: String,
}

impl TargetSpec {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Wires the components of a pass together; see module docs for the flow.
pub struct Profiler<'a> {
    config: &'a ProfilerConfig,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> Profiler<'a> {
    pub fn new(config: &'a ProfilerConfig, reporter: &'a dyn ProgressReporter) -> Self {
        Self { config, reporter }
    }

    /// Run one pass against one target.
    ///
    /// A sandbox-launch failure is fatal for this target only and yields a
    /// failed result with no partial data. Everything downstream degrades:
    /// an unreachable control endpoint drops the pass to OS-level
    /// monitoring, navigation timeouts are soft, and scenario-level
    /// problems surface as zeros or omissions.
    pub async fn profile(&self, target: &TargetSpec) -> ProfileResult {
        self.reporter.stage(&target.id, Stage::LaunchingSandbox);
        let launcher = match SandboxLauncher::discover(
            self.config.browser_binary.clone(),
            self.config.debug_port,
        ) {
            Ok(launcher) => launcher,
            Err(err) => return ProfileResult::failed(&target.id, err.to_string()),
        };
        let sandbox = match launcher.launch(&target.url) {
            Ok(sandbox) => sandbox,
            Err(err) => return ProfileResult::failed(&target.id, err.to_string()),
        };

        let mut sampler =
            ProcessSampler::for_pid(sandbox.pid()).with_cpu_interval(self.config.cpu_interval());

        // Let the browser finish forking its helper processes.
        sleep(self.config.startup_wait()).await;

        self.reporter.stage(&target.id, Stage::CalibratingBaseline);
        let calibrator = BaselineCalibrator::new(
            self.config.baseline_samples,
            self.config.baseline_interval(),
        );
        let baseline = calibrator.calibrate(&mut sampler).await;

        self.reporter.stage(&target.id, Stage::ConnectingDevtools);
        let mut client =
            match ProtocolClient::connect(&self.config.debug_host, sandbox.debug_port()).await {
                Ok(client) => Some(client),
                Err(err) => {
                    warn!(
                        target_id = %target.id,
                        error = %err,
                        "devtools unavailable; OS-level monitoring only"
                    );
                    None
                }
            };

        self.reporter.stage(&target.id, Stage::LoadingApplication);
        if let Some(c) = client.as_mut() {
            match c.navigate(&target.url).await {
                Ok(true) => debug!(target_id = %target.id, "load event observed"),
                Ok(false) => debug!(target_id = %target.id, "load event missed; continuing"),
                Err(err) => {
                    warn!(target_id = %target.id, error = %err, "navigation failed; continuing");
                }
            }
        }
        sleep(self.config.settle_wait()).await;

        let mut interaction_profiler = InteractionProfiler::new(&mut sampler, baseline);
        let mut interactions = Vec::with_capacity(Scenario::ALL.len());
        for scenario in Scenario::ALL {
            self.reporter
                .stage(&target.id, Stage::RunningScenario(scenario.name()));
            interactions.push(
                interaction_profiler
                    .run_scenario(scenario, &mut client)
                    .await,
            );
        }

        self.reporter.stage(&target.id, Stage::Finalizing);
        let final_snapshot = sampler.sample().await;
        let result = aggregate::finalize(&target.id, baseline, final_snapshot, interactions);

        self.reporter.stage(&target.id, Stage::TearingDown);
        if let Some(c) = client.take() {
            c.close().await;
        }
        sandbox.teardown().await;

        result
    }

    /// Repeat the pass N times (at least once) and reduce to statistics.
    pub async fn profile_repeated(&self, target: &TargetSpec, executions: u32) -> ProfileOutcome {
        let executions = executions.max(1);
        let mut results = Vec::with_capacity(executions as usize);
        for run in 1..=executions {
            debug!(target_id = %target.id, run, executions, "starting execution");
            results.push(self.profile(target).await);
        }
        aggregate::average(results)
    }

    /// Profile several targets strictly sequentially: one sandbox, one
    /// pass, full teardown, then the next. A failed target never aborts
    /// the others.
    pub async fn profile_many(
        &self,
        targets: &[TargetSpec],
        executions: u32,
    ) -> Vec<ProfileOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.profile_repeated(target, executions).await);
        }
        outcomes
    }
}
