use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables for a profiling pass. Loaded from TOML; every field has a
/// working default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Explicit browser executable; `$PATH` discovery when unset.
    pub browser_binary: Option<PathBuf>,
    /// Remote-debugging port handed to the sandbox.
    pub debug_port: u16,
    /// Host of the DevTools control endpoint.
    pub debug_host: String,
    /// Seconds to let the sandbox fork its helpers before sampling.
    pub startup_wait_s: f64,
    /// Seconds for page load and script warm-up to settle after navigation.
    pub settle_wait_s: f64,
    /// Idle samples averaged into the baseline (minimum 3).
    pub baseline_samples: usize,
    /// Milliseconds between baseline samples.
    pub baseline_interval_ms: u64,
    /// CPU measurement interval per snapshot, in milliseconds.
    pub cpu_interval_ms: u64,
    /// Executions per target when the command line gives none.
    pub executions: u32,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            browser_binary: None,
            debug_port: 9223,
            debug_host: "127.0.0.1".to_string(),
            startup_wait_s: 3.0,
            settle_wait_s: 2.0,
            baseline_samples: 3,
            baseline_interval_ms: 500,
            cpu_interval_ms: 200,
            executions: 1,
        }
    }
}

impl ProfilerConfig {
    /// Load from a TOML file; `None` means defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("parsing config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn startup_wait(&self) -> Duration {
        Duration::from_secs_f64(self.startup_wait_s.max(0.0))
    }

    pub fn settle_wait(&self) -> Duration {
        Duration::from_secs_f64(self.settle_wait_s.max(0.0))
    }

    pub fn baseline_interval(&self) -> Duration {
        Duration::from_millis(self.baseline_interval_ms)
    }

    pub fn cpu_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file_given() {
        let config = ProfilerConfig::load(None).unwrap();
        assert_eq!(config.debug_port, 9223);
        assert_eq!(config.baseline_samples, 3);
        assert_eq!(config.executions, 1);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ProfilerConfig = toml::from_str("debug_port = 9333\nexecutions = 5\n").unwrap();
        assert_eq!(config.debug_port, 9333);
        assert_eq!(config.executions, 5);
        assert_eq!(config.debug_host, "127.0.0.1");
        assert_eq!(config.cpu_interval_ms, 200);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProfilerConfig::load(Some(dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
