//! Isolated headless-browser sandbox.
//!
//! Each profiling pass gets its own browser process with a fresh, uniquely
//! named profile directory and a dedicated debug port: OS-level sampling can
//! then scope to the process subtree, and no state leaks between runs.
//!
//! Process management uses `sysinfo` and `which` for cross-platform support,
//! the same way the rest of the crate touches the process table.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tempfile::TempDir;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ProfileError;

/// Candidate executables, in preference order.
const BROWSER_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// How long a terminated browser gets before the forceful kill.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Locate a Chrome/Chromium executable on `$PATH`.
pub fn find_browser() -> Result<PathBuf, ProfileError> {
    for name in BROWSER_CANDIDATES {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }
    Err(ProfileError::BrowserNotFound {
        tried: BROWSER_CANDIDATES.join(", "),
    })
}

/// Spawns isolated headless browser instances.
pub struct SandboxLauncher {
    binary: PathBuf,
    debug_port: u16,
}

impl SandboxLauncher {
    pub fn new(binary: PathBuf, debug_port: u16) -> Self {
        Self { binary, debug_port }
    }

    /// Use the explicit override, or discover a browser on `$PATH`.
    pub fn discover(
        override_binary: Option<PathBuf>,
        debug_port: u16,
    ) -> Result<Self, ProfileError> {
        let binary = match override_binary {
            Some(path) => path,
            None => find_browser()?,
        };
        Ok(Self::new(binary, debug_port))
    }

    /// Spawn a headless instance pointed at `url`.
    ///
    /// Sandboxing, GPU, extensions, and background throttling are disabled
    /// so headless operation stays deterministic across machines.
    pub fn launch(&self, url: &str) -> Result<Sandbox, ProfileError> {
        let launch_err = |source| ProfileError::SandboxLaunch {
            binary: self.binary.clone(),
            source,
        };

        let profile_dir = tempfile::Builder::new()
            .prefix("webgauge-profile-")
            .tempdir()
            .map_err(launch_err)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless=new")
            .arg(format!("--remote-debugging-port={}", self.debug_port))
            .arg(format!("--user-data-dir={}", profile_dir.path().display()))
            .args([
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-plugins",
                "--disable-background-timer-throttling",
                "--disable-backgrounding-occluded-windows",
                "--disable-renderer-backgrounding",
                "--window-size=1920,1080",
            ])
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(launch_err)?;
        debug!(
            pid = child.id(),
            port = self.debug_port,
            profile = %profile_dir.path().display(),
            "sandbox launched"
        );

        Ok(Sandbox {
            child,
            profile_dir: Some(profile_dir),
            debug_port: self.debug_port,
        })
    }
}

/// A running sandboxed browser instance.
///
/// Tear down with [`Sandbox::teardown`]; if that never runs, dropping the
/// held [`TempDir`] still removes the profile directory.
pub struct Sandbox {
    child: Child,
    profile_dir: Option<TempDir>,
    debug_port: u16,
}

impl Sandbox {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    pub fn profile_path(&self) -> Option<&Path> {
        self.profile_dir.as_ref().map(|d| d.path())
    }

    /// Terminate the process and remove the profile directory.
    ///
    /// Graceful Term first, forceful kill after the grace period, then
    /// directory removal. Every step is best-effort and a failed step never
    /// skips the next.
    pub async fn teardown(mut self) {
        let pid = self.child.id();

        if signal_term(pid) {
            let mut waited = Duration::ZERO;
            while waited < TERM_GRACE {
                if matches!(self.child.try_wait(), Ok(Some(_))) {
                    break;
                }
                sleep(Duration::from_millis(100)).await;
                waited += Duration::from_millis(100);
            }
        }

        match self.child.try_wait() {
            Ok(Some(status)) => debug!(pid, %status, "sandbox exited"),
            _ => {
                warn!(pid, "sandbox ignored graceful termination; killing");
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }

        if let Some(dir) = self.profile_dir.take() {
            if let Err(err) = dir.close() {
                warn!(error = %err, "profile directory not fully removed");
            }
        }
    }
}

/// Graceful Term via the process table. False when the process is already
/// gone or the platform has no graceful signal.
fn signal_term(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .map(|p| p.kill_with(Signal::Term).unwrap_or(false))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_prefers_explicit_override() {
        let launcher =
            SandboxLauncher::discover(Some(PathBuf::from("/opt/custom/chrome")), 9223).unwrap();
        assert_eq!(launcher.binary, PathBuf::from("/opt/custom/chrome"));
        assert_eq!(launcher.debug_port, 9223);
    }

    #[test]
    fn signalling_a_dead_pid_is_false() {
        assert!(!signal_term(4_194_304));
    }
}
