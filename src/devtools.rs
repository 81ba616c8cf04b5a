//! Remote-debugging protocol client.
//!
//! A minimal DevTools-protocol subset over one persistent websocket:
//! connect, navigate, evaluate, heap usage. Requests carry monotonically
//! increasing ids and responses are correlated by id, so every public call
//! is synchronous from the caller's view. Unsolicited event notifications
//! arriving interleaved are buffered without disrupting the pending
//! correlation.
//!
//! One connection is owned by one profiling pass; callers serialize through
//! `&mut self`.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::ProfileError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(3);
const EVENT_POLL: Duration = Duration::from_millis(100);
/// Unconsumed event notifications kept around for correlation; older ones
/// are shed first.
const EVENT_BUFFER_CAP: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One debuggable target advertised by the control endpoint.
#[derive(Debug, Deserialize)]
struct DebugTarget {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

/// Script-engine heap figures from `Performance.getMetrics`.
///
/// `connection_working == false` marks a degraded reading (introspection
/// failed); the zeroed figures are data, never an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapUsage {
    pub heap_used_mb: f64,
    pub heap_total_mb: f64,
    pub connection_working: bool,
}

impl HeapUsage {
    /// The degraded reading used whenever heap introspection fails or no
    /// connection exists.
    pub fn unavailable() -> Self {
        Self {
            heap_used_mb: 0.0,
            heap_total_mb: 0.0,
            connection_working: false,
        }
    }
}

#[derive(Debug)]
pub struct ProtocolClient {
    ws: WsStream,
    next_id: u64,
    events: VecDeque<Value>,
}

impl ProtocolClient {
    /// Query the control endpoint and attach to a debuggable target.
    ///
    /// Prefers a page-type target's socket; asks the browser for a blank
    /// page when none exists yet; falls back to the browser-level socket.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ProfileError> {
        let base = format!("http://{host}:{port}");
        let control = |source| ProfileError::ControlEndpoint {
            endpoint: base.clone(),
            source,
        };

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(control)?;

        // The browser-level socket works even with no pages open.
        let version: VersionInfo = http
            .get(format!("{base}/json/version"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(control)?
            .json()
            .await
            .map_err(control)?;

        let mut targets = list_targets(&http, &base).await?;
        if targets.is_empty() {
            // Ask for a blank page, then re-enumerate.
            let _ = http.get(format!("{base}/json/new?about:blank")).send().await;
            targets = list_targets(&http, &base).await?;
        }

        let page_ws = targets
            .into_iter()
            .find(|t| t.kind == "page" && t.ws_url.is_some())
            .and_then(|t| t.ws_url);
        let ws_url = page_ws
            .or(version.ws_url)
            .ok_or_else(|| ProfileError::NoDebugTarget {
                endpoint: base.clone(),
            })?;

        debug!(%ws_url, "attaching to debug target");
        let (ws, _) = timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(ws_url.as_str()),
        )
        .await
        .map_err(|_| ProfileError::CommandTimeout {
            method: "connect".into(),
            timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
        })??;

        Ok(Self {
            ws,
            next_id: 1,
            events: VecDeque::new(),
        })
    }

    /// Issue one command and await its correlated response.
    ///
    /// Responses for other ids are stale leftovers from abandoned calls and
    /// are dropped; frames without an id are event notifications and are
    /// buffered for [`ProtocolClient::navigate`]'s load polling.
    pub async fn send_command(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<Value, ProfileError> {
        let id = self.next_id;
        self.next_id += 1;
        let frame = json!({ "id": id, "method": method, "params": params });
        self.ws.send(Message::text(frame.to_string())).await?;

        let deadline = tokio::time::Instant::now() + COMMAND_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ProfileError::CommandTimeout {
                    method: method.to_string(),
                    timeout_ms: COMMAND_TIMEOUT.as_millis() as u64,
                });
            }
            let message = match timeout(remaining, self.ws.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(err))) => return Err(err.into()),
                Ok(None) => return Err(ProfileError::ConnectionClosed),
                Err(_) => {
                    return Err(ProfileError::CommandTimeout {
                        method: method.to_string(),
                        timeout_ms: COMMAND_TIMEOUT.as_millis() as u64,
                    });
                }
            };
            let Message::Text(text) = message else {
                continue;
            };
            let value: Value = serde_json::from_str(&text)?;
            match value.get("id").and_then(Value::as_u64) {
                Some(got) if got == id => return Ok(value),
                Some(_) => continue,
                None => self.buffer_event(value),
            }
        }
    }

    /// Navigate the attached page and wait for the load event.
    ///
    /// Returns `Ok(false)` when the event never arrived inside the window —
    /// a soft success, since headless navigation timing is unreliable and
    /// later sampling copes either way. `Err` means the command itself could
    /// not be issued.
    pub async fn navigate(&mut self, url: &str) -> Result<bool, ProfileError> {
        self.send_command("Page.enable", json!({})).await?;
        self.send_command("Runtime.enable", json!({})).await?;
        self.send_command("Page.navigate", json!({ "url": url }))
            .await?;

        let deadline = tokio::time::Instant::now() + NAVIGATION_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if self.take_event("Page.loadEventFired") {
                return Ok(true);
            }
            match timeout(EVENT_POLL, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    if value.get("method").and_then(Value::as_str) == Some("Page.loadEventFired") {
                        return Ok(true);
                    }
                    if value.get("id").is_none() {
                        self.buffer_event(value);
                    }
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(_))) | Ok(None) => break,
                // Poll window elapsed without traffic; re-check the clock.
                Err(_) => {}
            }
        }
        debug!(%url, "no load event within window; treating as loaded");
        Ok(false)
    }

    /// Evaluate a script expression in the page.
    pub async fn evaluate(&mut self, expr: &str) -> Result<Value, ProfileError> {
        self.send_command("Runtime.evaluate", json!({ "expression": expr }))
            .await
    }

    /// Query script-engine heap figures.
    ///
    /// Never fails: any error degrades to a zeroed reading with
    /// `connection_working == false`. Heap introspection must not be able to
    /// abort a profiling pass.
    pub async fn heap_usage(&mut self) -> HeapUsage {
        match self.heap_usage_inner().await {
            Ok(usage) => usage,
            Err(err) => {
                warn!(error = %err, "heap introspection failed");
                HeapUsage::unavailable()
            }
        }
    }

    async fn heap_usage_inner(&mut self) -> Result<HeapUsage, ProfileError> {
        self.send_command("Performance.enable", json!({})).await?;
        // A forced GC tightens the reading; not every build exposes it.
        if self
            .send_command("HeapProfiler.enable", json!({}))
            .await
            .is_ok()
        {
            let _ = self
                .send_command("HeapProfiler.collectGarbage", json!({}))
                .await;
        }

        let reply = self
            .send_command("Performance.getMetrics", json!({}))
            .await?;
        let Some(metrics) = reply.pointer("/result/metrics").and_then(Value::as_array) else {
            // Connected, but this target reports no metrics.
            return Ok(HeapUsage {
                heap_used_mb: 0.0,
                heap_total_mb: 0.0,
                connection_working: true,
            });
        };
        let metric = |name: &str| {
            metrics
                .iter()
                .find(|m| m.get("name").and_then(Value::as_str) == Some(name))
                .and_then(|m| m.get("value").and_then(Value::as_f64))
                .unwrap_or(0.0)
        };
        Ok(HeapUsage {
            heap_used_mb: metric("JSHeapUsedSize") / (1024.0 * 1024.0),
            heap_total_mb: metric("JSHeapTotalSize") / (1024.0 * 1024.0),
            connection_working: true,
        })
    }

    /// Close the socket. Best-effort; a dead peer is fine.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    fn buffer_event(&mut self, event: Value) {
        if self.events.len() >= EVENT_BUFFER_CAP {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Remove and report any buffered occurrence of `method`.
    fn take_event(&mut self, method: &str) -> bool {
        let before = self.events.len();
        self.events
            .retain(|e| e.get("method").and_then(Value::as_str) != Some(method));
        self.events.len() != before
    }
}

async fn list_targets(
    http: &reqwest::Client,
    base: &str,
) -> Result<Vec<DebugTarget>, ProfileError> {
    http.get(format!("{base}/json/list"))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| ProfileError::ControlEndpoint {
            endpoint: base.to_string(),
            source,
        })?
        .json()
        .await
        .map_err(|source| ProfileError::ControlEndpoint {
            endpoint: base.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_reading_is_zeroed() {
        let heap = HeapUsage::unavailable();
        assert!(!heap.connection_working);
        assert_eq!(heap.heap_used_mb, 0.0);
        assert_eq!(heap.heap_total_mb, 0.0);
    }

    #[tokio::test]
    async fn connect_to_closed_port_reports_control_endpoint() {
        // Port 1 needs root to bind; nothing listens there.
        let err = ProtocolClient::connect("127.0.0.1", 1).await.unwrap_err();
        assert!(matches!(err, ProfileError::ControlEndpoint { .. }));
    }
}
