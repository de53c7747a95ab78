//! Scripted mock acquisition service for end-to-end testing.
//!
//! [`MockCortexServer`] is a WebSocket listener that speaks just enough of
//! the service's JSON-RPC dialect to drive the full session lifecycle:
//! handshake methods are answered from a [`ServerScript`], and a successful
//! subscribe starts a stream of synthetic band-power frames interleaved
//! with any further requests.
//!
//! # Example
//!
//! ```no_run
//! use mindlink_test_harness::{MockCortexServer, ServerScript};
//!
//! # async fn example() -> mindlink_core::Result<()> {
//! let mut server = MockCortexServer::new(ServerScript::default()).await?;
//! server.start();
//!
//! let url = server.url();
//! // ... connect a WsTransport to `url` and run a session ...
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::debug;

use mindlink_core::error::{Error, Result};

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Scripted behavior for one mock service run.
///
/// The defaults describe a healthy service: access granted, one connected
/// headset, and 60 frames of plausible band power after subscribe.
#[derive(Debug, Clone)]
pub struct ServerScript {
    /// Whether `requestAccess` succeeds.
    pub grant_access: bool,
    /// Token returned by `authorize`; `None` omits it from the result.
    pub token: Option<String>,
    /// Headset ids returned by `queryHeadsets`.
    pub headsets: Vec<String>,
    /// Session id returned by `createSession`; `None` omits it.
    pub session_id: Option<String>,
    /// Streams rejected by `subscribe` (reported in `result.failure`).
    pub restricted_streams: Vec<String>,
    /// How many band-power frames to emit after a successful subscribe.
    pub frame_count: usize,
    /// Delay between emitted frames.
    pub frame_period: Duration,
    /// Length of each emitted band-power vector.
    pub vector_len: usize,
    /// Emit all-zero vectors (simulates a dry-contact headset).
    pub zero_values: bool,
    /// Frames to emit between receiving `subscribe` and answering it,
    /// exercising response correlation amid interleaved telemetry.
    pub notifications_before_response: usize,
}

impl Default for ServerScript {
    fn default() -> Self {
        Self {
            grant_access: true,
            token: Some("mock-token".to_string()),
            headsets: vec!["MOCK-HEADSET-1".to_string()],
            session_id: Some("mock-session-1".to_string()),
            restricted_streams: Vec::new(),
            frame_count: 60,
            frame_period: Duration::from_millis(20),
            vector_len: 25,
            zero_values: false,
            notifications_before_response: 0,
        }
    }
}

impl ServerScript {
    fn sid(&self) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| "mock-session".to_string())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A scripted mock acquisition service on a local WebSocket listener.
///
/// The server listens on a random port on localhost. Once
/// [`start`](MockCortexServer::start) is called it accepts a single
/// connection and serves it until the client disconnects.
pub struct MockCortexServer {
    listener: Option<TcpListener>,
    url: String,
    script: ServerScript,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockCortexServer {
    /// Bind a mock service on a random local port.
    ///
    /// The server does not accept connections until
    /// [`start`](MockCortexServer::start) is called.
    pub async fn new(script: ServerScript) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock server: {}", e)))?;
        let url = format!("ws://{}", listener.local_addr().map_err(Error::Io)?);

        Ok(Self {
            listener: Some(listener),
            url,
            script,
            server_handle: None,
        })
    }

    /// The `ws://` URL to connect a transport to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the server, accepting a single client connection.
    ///
    /// Spawns a background task. Call [`wait`](MockCortexServer::wait) to
    /// block until the client disconnects and check for script violations.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let script = self.script.clone();

        let handle = tokio::spawn(async move {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;
            debug!(addr = %addr, "Mock service accepted connection");

            let ws = accept_async(stream)
                .await
                .map_err(|e| format!("WebSocket upgrade failed: {}", e))?;

            serve(ws, script).await
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task to finish (client disconnected).
    pub async fn wait(mut self) -> std::result::Result<(), String> {
        match self.server_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    script: ServerScript,
) -> std::result::Result<(), String> {
    let mut streaming = false;
    let mut frames_sent = 0usize;
    let mut ticker = tokio::time::interval(script.frame_period);

    loop {
        tokio::select! {
            _ = ticker.tick(), if streaming && frames_sent < script.frame_count => {
                let frame = pow_frame(&script, frames_sent);
                ws.send(Message::Text(frame))
                    .await
                    .map_err(|e| format!("failed to send frame: {}", e))?;
                frames_sent += 1;
            }
            msg = ws.next() => {
                match msg {
                    None => return Ok(()),
                    Some(Err(e)) => {
                        // Client dropping the connection mid-close is fine.
                        debug!(error = %e, "Mock service connection ended");
                        return Ok(());
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_request(&mut ws, &script, &text, &mut streaming).await?;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        ws.send(Message::Pong(payload))
                            .await
                            .map_err(|e| format!("failed to send pong: {}", e))?;
                    }
                    Some(Ok(Message::Close(_))) => return Ok(()),
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn handle_request(
    ws: &mut WebSocketStream<TcpStream>,
    script: &ServerScript,
    text: &str,
    streaming: &mut bool,
) -> std::result::Result<(), String> {
    let request: Value =
        serde_json::from_str(text).map_err(|e| format!("client sent invalid JSON: {}", e))?;
    let id = request
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("client request has no id: {}", text))?;
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("client request has no method: {}", text))?;
    debug!(id, method, "Mock service handling request");

    let reply = match method {
        "getCortexInfo" => success(id, json!({"buildNumber": "mock", "version": "2.0"})),
        "requestAccess" => {
            if script.grant_access {
                success(id, json!({"accessGranted": true}))
            } else {
                failure(id, -32002, "access denied by user")
            }
        }
        "authorize" => match &script.token {
            Some(token) => success(id, json!({"cortexToken": token})),
            None => success(id, json!({})),
        },
        "queryHeadsets" => {
            let headsets: Vec<Value> = script
                .headsets
                .iter()
                .map(|h| json!({"id": h, "status": "connected"}))
                .collect();
            success(id, Value::Array(headsets))
        }
        "createSession" => match &script.session_id {
            Some(sid) => success(id, json!({"id": sid, "status": "open"})),
            None => success(id, json!({})),
        },
        "subscribe" => {
            // Optionally interleave telemetry ahead of the response.
            for n in 0..script.notifications_before_response {
                ws.send(Message::Text(pow_frame(script, n)))
                    .await
                    .map_err(|e| format!("failed to send frame: {}", e))?;
            }

            let requested: Vec<String> = request
                .get("params")
                .and_then(|p| p.get("streams"))
                .and_then(Value::as_array)
                .map(|streams| {
                    streams
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let (rejected, accepted): (Vec<String>, Vec<String>) = requested
                .into_iter()
                .partition(|s| script.restricted_streams.contains(s));

            let success_list: Vec<Value> = accepted
                .iter()
                .map(|s| json!({"streamName": s}))
                .collect();
            let failure_list: Vec<Value> = rejected
                .iter()
                .map(|s| json!({"streamName": s, "message": "stream restricted"}))
                .collect();

            if failure_list.is_empty() {
                *streaming = true;
            }
            success(id, json!({"success": success_list, "failure": failure_list}))
        }
        "unsubscribe" => {
            *streaming = false;
            success(id, json!({"success": [{"streamName": "pow"}], "failure": []}))
        }
        "updateSession" => {
            *streaming = false;
            success(id, json!({"id": script.sid(), "status": "close"}))
        }
        other => failure(id, -32601, &format!("method not found: {}", other)),
    };

    ws.send(Message::Text(reply))
        .await
        .map_err(|e| format!("failed to send reply: {}", e))
}

// ---------------------------------------------------------------------------
// Frame synthesis
// ---------------------------------------------------------------------------

/// Build one synthetic band-power telemetry frame.
fn pow_frame(script: &ServerScript, n: usize) -> String {
    let values: Vec<f64> = if script.zero_values {
        vec![0.0; script.vector_len]
    } else {
        let mut rng = rand::thread_rng();
        (0..script.vector_len)
            .map(|_| rng.gen_range(0.1..1.0))
            .collect()
    };

    json!({
        "pow": values,
        "sid": script.sid(),
        "time": 1000.0 + n as f64 * script.frame_period.as_secs_f64(),
    })
    .to_string()
}

fn success(id: u64, result: Value) -> String {
    json!({"id": id, "jsonrpc": "2.0", "result": result}).to_string()
}

fn failure(id: u64, code: i64, message: &str) -> String {
    json!({"id": id, "jsonrpc": "2.0", "error": {"code": code, "message": message}}).to_string()
}
