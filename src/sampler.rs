//! OS-level process sampling via the system process table.
//!
//! CPU percent is an interval measurement: counters are primed with one
//! refresh, we wait a short fixed interval, refresh again, and sum the
//! per-process deltas. That wait dominates per-sample latency, so one
//! snapshot costs roughly `cpu_interval` wall-clock.
//!
//! All process-table access uses `sysinfo`, matching the cross-platform
//! process management elsewhere in this crate.

use std::collections::HashSet;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::sleep;

use crate::snapshot::ResourceSnapshot;

const DEFAULT_CPU_INTERVAL: Duration = Duration::from_millis(200);

/// How a sampler resolves the live process set it measures.
#[derive(Debug, Clone)]
pub enum Target {
    /// Root process id; the whole subtree below it is measured. Preferred —
    /// unambiguous attribution.
    Subtree(u32),
    /// Case-insensitive substring matched against process name and command
    /// line. Fallback when no root PID is available; inherently ambiguous.
    NameContains(String),
}

/// Samples aggregate memory/CPU for one target's process set.
pub struct ProcessSampler {
    system: System,
    target: Target,
    cpu_interval: Duration,
}

impl ProcessSampler {
    pub fn new(target: Target) -> Self {
        Self {
            system: System::new(),
            target,
            cpu_interval: DEFAULT_CPU_INTERVAL,
        }
    }

    /// Sampler scoped to a spawned process and its descendants.
    pub fn for_pid(root: u32) -> Self {
        Self::new(Target::Subtree(root))
    }

    /// Sampler matching by name/command-line substring.
    pub fn for_name(needle: impl Into<String>) -> Self {
        Self::new(Target::NameContains(needle.into()))
    }

    /// Override the CPU measurement interval. Tests shorten it.
    pub fn with_cpu_interval(mut self, interval: Duration) -> Self {
        self.cpu_interval = interval;
        self
    }

    /// Take one aggregate snapshot.
    ///
    /// Zero matches yields an all-zero snapshot with `process_count == 0`.
    /// A process that vanishes between priming and reading is excluded from
    /// the sums and the count. Processes we cannot read are skipped.
    pub async fn sample(&mut self) -> ResourceSnapshot {
        // Prime the CPU counters for the whole table, wait, read deltas.
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        let matched = self.matched_pids();
        if matched.is_empty() {
            return ResourceSnapshot::empty();
        }

        sleep(self.cpu_interval).await;
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        let mut memory_mb = 0.0;
        let mut cpu_percent = 0.0;
        let mut alive = 0u32;
        for pid in &matched {
            let Some(process) = self.system.process(*pid) else {
                continue;
            };
            memory_mb += process.memory() as f64 / 1024.0 / 1024.0;
            cpu_percent += f64::from(process.cpu_usage());
            alive += 1;
        }

        ResourceSnapshot::now(memory_mb, cpu_percent, alive)
    }

    fn matched_pids(&self) -> Vec<Pid> {
        match &self.target {
            Target::Subtree(root) => self.subtree_of(Pid::from_u32(*root)),
            Target::NameContains(needle) => self.scan_for(needle),
        }
    }

    /// The root and every (transitive) child still in the table.
    fn subtree_of(&self, root: Pid) -> Vec<Pid> {
        if self.system.process(root).is_none() {
            return Vec::new();
        }
        let processes = self.system.processes();
        let mut members: HashSet<Pid> = HashSet::from([root]);
        // Parent links only point upward; iterate until no new descendants
        // turn up. Converges in a handful of passes on real tables.
        loop {
            let before = members.len();
            for (pid, process) in processes {
                if let Some(parent) = process.parent() {
                    if members.contains(&parent) {
                        members.insert(*pid);
                    }
                }
            }
            if members.len() == before {
                break;
            }
        }
        members.into_iter().collect()
    }

    fn scan_for(&self, needle: &str) -> Vec<Pid> {
        let needle = needle.to_lowercase();
        self.system
            .processes()
            .iter()
            .filter(|(_, process)| {
                if process
                    .name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&needle)
                {
                    return true;
                }
                process
                    .cmd()
                    .iter()
                    .any(|arg| arg.to_string_lossy().to_lowercase().contains(&needle))
            })
            .map(|(pid, _)| *pid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_root_pid_yields_zero_snapshot() {
        // PID far beyond any default pid_max.
        let mut sampler =
            ProcessSampler::for_pid(4_194_304).with_cpu_interval(Duration::from_millis(10));
        let snap = sampler.sample().await;
        assert_eq!(snap.process_count, 0);
        assert_eq!(snap.memory_mb, 0.0);
        assert_eq!(snap.cpu_percent, 0.0);
    }

    #[tokio::test]
    async fn unmatched_name_yields_zero_snapshot() {
        let mut sampler = ProcessSampler::for_name("webgauge-no-such-process-name")
            .with_cpu_interval(Duration::from_millis(10));
        let snap = sampler.sample().await;
        assert_eq!(snap.process_count, 0);
        assert_eq!(snap.memory_mb, 0.0);
    }

    #[tokio::test]
    async fn own_process_is_found_by_subtree() {
        let mut sampler = ProcessSampler::for_pid(std::process::id())
            .with_cpu_interval(Duration::from_millis(10));
        let snap = sampler.sample().await;
        assert!(snap.process_count >= 1);
        assert!(snap.memory_mb > 0.0);
        assert!(snap.cpu_percent >= 0.0);
    }
}
