//! Error taxonomy for the profiling pass.
//!
//! Each variant marks a boundary where the caller makes a deliberate
//! continue-vs-abort decision: sandbox failures are fatal for their target,
//! control-endpoint failures degrade the pass to OS-level monitoring, and
//! socket-level failures degrade individual readings.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    /// No Chrome/Chromium executable on this machine.
    #[error("no headless browser executable found (tried: {tried})")]
    BrowserNotFound { tried: String },

    /// The browser process could not be spawned. Fatal for the target.
    #[error("failed to launch browser sandbox from {binary}: {source}")]
    SandboxLaunch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The DevTools control endpoint did not answer; the pass degrades to
    /// OS-level monitoring only.
    #[error("devtools control endpoint unreachable at {endpoint}: {source}")]
    ControlEndpoint {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The control endpoint answered but offered nothing debuggable.
    #[error("no debuggable target exposed at {endpoint}")]
    NoDebugTarget { endpoint: String },

    #[error("devtools socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("devtools command {method} timed out after {timeout_ms} ms")]
    CommandTimeout { method: String, timeout_ms: u64 },

    #[error("devtools sent a malformed frame: {0}")]
    BadFrame(#[from] serde_json::Error),

    /// The socket closed mid-correlation.
    #[error("devtools connection closed")]
    ConnectionClosed,
}

impl ProfileError {
    /// True when the underlying connection is gone and further commands on
    /// it are pointless.
    pub fn is_connection_dead(&self) -> bool {
        matches!(
            self,
            ProfileError::Socket(_) | ProfileError::ConnectionClosed
        )
    }
}
