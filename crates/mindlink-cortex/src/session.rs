//! Session lifecycle: handshake, collection, streaming, teardown.
//!
//! [`CortexSession`] drives the multi-step handshake that takes a fresh
//! connection to a subscribed, streaming session, runs timed collection
//! windows over the telemetry, and tears the session down deterministically
//! in reverse order of acquisition.
//!
//! The handshake sequence:
//!
//! ```text
//! getCortexInfo -> requestAccess -> authorize -> queryHeadsets
//!               -> createSession -> subscribe
//! ```
//!
//! Any failed step marks the session [`SessionState::Failed`], closes the
//! transport, and reports which step failed via
//! [`Error::Handshake`](mindlink_core::Error::Handshake).

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mindlink_core::{
    AuthToken, BandAverages, Credentials, Error, HandshakeStep, Result, SessionHandle, StreamKind,
};

use crate::aggregator::{Accumulator, MIN_SAMPLES_REQUIRED};
use crate::client::CortexClient;
use crate::codec::{self, methods, RpcResponse};
use crate::decoder::{DecodedFrame, StreamDecoder};
use crate::recorder::FrameRecorder;

// ---------------------------------------------------------------------------
// State and configuration
// ---------------------------------------------------------------------------

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet, or the transport was closed before the handshake.
    Disconnected,
    /// Transport connected, handshake not started.
    Connected,
    /// `requestAccess` acknowledged.
    AccessRequested,
    /// `authorize` returned a token.
    Authorized,
    /// `queryHeadsets` found a device.
    DeviceDiscovered,
    /// `createSession` returned a session id.
    SessionOpen,
    /// Streams subscribed; telemetry is flowing.
    Subscribed,
    /// A collection window is actively draining telemetry.
    Streaming,
    /// Teardown in progress.
    Unsubscribing,
    /// Teardown finished; the session cannot be reused.
    Closed,
    /// A handshake step or the connection failed.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::AccessRequested => "access-requested",
            SessionState::Authorized => "authorized",
            SessionState::DeviceDiscovered => "device-discovered",
            SessionState::SessionOpen => "session-open",
            SessionState::Subscribed => "subscribed",
            SessionState::Streaming => "streaming",
            SessionState::Unsubscribing => "unsubscribing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Session behavior knobs. Built by
/// [`CortexSessionBuilder`](crate::builder::CortexSessionBuilder).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub credentials: Credentials,
    /// Streams to subscribe to. Defaults to band power only.
    pub streams: Vec<StreamKind>,
    /// Per-call timeout for handshake and teardown requests.
    pub call_timeout: Duration,
    /// Receive timeout for one telemetry wait on the streaming path.
    pub receive_timeout: Duration,
    /// Minimum decoded frames for a collection window to succeed.
    pub min_samples: usize,
}

impl SessionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            streams: vec![StreamKind::Pow],
            call_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(1),
            min_samples: MIN_SAMPLES_REQUIRED,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated, subscribed session with the acquisition service.
pub struct CortexSession {
    client: CortexClient,
    config: SessionConfig,
    state: SessionState,
    handle: Option<SessionHandle>,
    decoder: StreamDecoder,
    recorder: Option<FrameRecorder>,
}

impl CortexSession {
    pub(crate) fn new(
        client: CortexClient,
        config: SessionConfig,
        recorder: Option<FrameRecorder>,
    ) -> Self {
        Self {
            client,
            config,
            state: SessionState::Connected,
            handle: None,
            decoder: StreamDecoder::new(),
            recorder,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session handle, available once `createSession` has succeeded.
    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    // -- handshake ----------------------------------------------------------

    /// Run the full handshake: authenticate, discover a headset, open a
    /// session, and subscribe to the configured streams.
    ///
    /// On any failure the session transitions to [`SessionState::Failed`]
    /// and the transport is closed before the error is returned.
    pub async fn establish(&mut self) -> Result<()> {
        match self.run_handshake().await {
            Ok(()) => {
                info!(state = %self.state, "Session established");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Handshake failed, closing transport");
                self.state = SessionState::Failed;
                if let Err(close_err) = self.client.close().await {
                    warn!(error = %close_err, "Failed to close transport after handshake failure");
                }
                Err(e)
            }
        }
    }

    async fn run_handshake(&mut self) -> Result<()> {
        // Service identification is informational; its payload is logged
        // but nothing downstream depends on it.
        let info = self.call(methods::GET_CORTEX_INFO, None).await?;
        debug!(info = %raw_json(&info), "Service info");

        // Step 1: request access for these credentials.
        let params = codec::request_access_params(
            self.config.credentials.client_id(),
            self.config.credentials.client_secret(),
        );
        let resp = self.call(methods::REQUEST_ACCESS, Some(&params)).await?;
        self.check_step(HandshakeStep::RequestAccess, &resp)?;
        self.state = SessionState::AccessRequested;
        debug!("Access granted");

        // Step 2: authorize, yielding the token for all later calls.
        let params = codec::authorize_params(
            self.config.credentials.client_id(),
            self.config.credentials.client_secret(),
        );
        let resp = self.call(methods::AUTHORIZE, Some(&params)).await?;
        self.check_step(HandshakeStep::Authorize, &resp)?;
        let token = resp
            .result
            .as_ref()
            .and_then(|r| r.get("cortexToken"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Handshake {
                step: HandshakeStep::Authorize,
                response: format!("no cortexToken in result: {}", raw_json(&resp)),
            })?
            .to_string();
        self.state = SessionState::Authorized;
        debug!("Authorization token obtained");

        // Step 3: find a connected headset; the first one listed is used.
        let resp = self
            .call(methods::QUERY_HEADSETS, Some(&codec::query_headsets_params()))
            .await?;
        self.check_step(HandshakeStep::QueryHeadsets, &resp)?;
        let headset_id = resp
            .result
            .as_ref()
            .and_then(Value::as_array)
            .and_then(|headsets| headsets.first())
            .and_then(|h| h.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Handshake {
                step: HandshakeStep::QueryHeadsets,
                response: format!("no headset available: {}", raw_json(&resp)),
            })?
            .to_string();
        self.state = SessionState::DeviceDiscovered;
        info!(headset_id = %headset_id, "Headset discovered");

        // Step 4: open an active session on that headset.
        let params = codec::create_session_params(&token, &headset_id);
        let resp = self.call(methods::CREATE_SESSION, Some(&params)).await?;
        self.check_step(HandshakeStep::CreateSession, &resp)?;
        let session_id = resp
            .result
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Handshake {
                step: HandshakeStep::CreateSession,
                response: format!("no session id in result: {}", raw_json(&resp)),
            })?
            .to_string();

        let handle = SessionHandle {
            session_id,
            headset_id,
            token: AuthToken::new(token),
        };
        self.state = SessionState::SessionOpen;
        info!(session_id = %handle.session_id, "Session opened");

        // Step 5: subscribe to the configured streams.
        let params = codec::subscribe_params(&handle, &self.config.streams);
        let resp = self.call(methods::SUBSCRIBE, Some(&params)).await?;
        self.check_subscribe(&resp)?;
        self.handle = Some(handle);
        self.state = SessionState::Subscribed;
        info!(streams = ?self.config.streams, "Streams subscribed");

        Ok(())
    }

    /// Fail a handshake step if the response carries an `error` member.
    fn check_step(&self, step: HandshakeStep, resp: &RpcResponse) -> Result<()> {
        match &resp.error {
            Some(err) => Err(Error::Handshake {
                step,
                response: err.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Subscribe has its own failure shape: even a non-error response can
    /// carry a non-empty `result.failure` array listing rejected streams.
    fn check_subscribe(&self, resp: &RpcResponse) -> Result<()> {
        self.check_step(HandshakeStep::Subscribe, resp)?;

        let failures = resp
            .result
            .as_ref()
            .and_then(|r| r.get("failure"))
            .and_then(Value::as_array);
        match failures {
            Some(list) if !list.is_empty() => Err(Error::Handshake {
                step: HandshakeStep::Subscribe,
                response: format!(
                    "{} stream(s) rejected: {}",
                    list.len(),
                    Value::Array(list.clone())
                ),
            }),
            _ => Ok(()),
        }
    }

    async fn call(&mut self, method: &str, params: Option<&Value>) -> Result<RpcResponse> {
        self.client
            .call(method, params, self.config.call_timeout)
            .await
    }

    // -- collection ---------------------------------------------------------

    /// Drain telemetry for `duration`, then reduce it to per-band averages.
    ///
    /// Requires an established session. Individual receive timeouts inside
    /// the window are keepalive conditions and do not abort it; the window
    /// fails only on connection loss or when the final frame count falls
    /// short of the configured minimum.
    pub async fn collect(&mut self, duration: Duration) -> Result<BandAverages> {
        self.require_subscribed()?;
        self.state = SessionState::Streaming;
        info!(duration_s = duration.as_secs_f64(), "Collection window started");

        let mut accumulator = Accumulator::new();
        let result = self
            .drain_telemetry(duration, None, |frame| {
                if let DecodedFrame::Power(power) = frame {
                    accumulator.record_frame(power);
                }
            })
            .await;
        self.state = SessionState::Subscribed;
        result?;

        info!(frames = accumulator.frame_count(), "Collection window finished");
        accumulator.finalize(self.config.min_samples)
    }

    /// Stream decoded telemetry to a callback until `cancel` fires.
    ///
    /// Every decoded frame (band power and raw EEG alike) is passed to
    /// `on_frame` after being recorded, if recording is enabled.
    pub async fn stream<F>(&mut self, cancel: &CancellationToken, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&DecodedFrame),
    {
        self.require_subscribed()?;
        self.state = SessionState::Streaming;
        info!("Streaming until cancelled");

        let result = self
            .drain_telemetry(Duration::MAX, Some(cancel), |frame| on_frame(frame))
            .await;
        self.state = SessionState::Subscribed;
        result
    }

    /// Shared telemetry loop for `collect` and `stream`.
    async fn drain_telemetry<F>(
        &mut self,
        duration: Duration,
        cancel: Option<&CancellationToken>,
        mut on_frame: F,
    ) -> Result<()>
    where
        F: FnMut(&DecodedFrame),
    {
        let deadline = Instant::now().checked_add(duration);

        loop {
            if let Some(cancel) = cancel {
                if cancel.is_cancelled() {
                    debug!("Streaming cancelled");
                    return Ok(());
                }
            }

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(());
                    }
                    remaining.min(self.config.receive_timeout)
                }
                None => self.config.receive_timeout,
            };

            let notification = match self.client.next_notification(wait).await? {
                Some(n) => n,
                // Keepalive timeout; loop back to re-check deadline/cancel.
                None => continue,
            };

            if let Some(frame) = self.decoder.decode(&notification) {
                if let Some(recorder) = &mut self.recorder {
                    recorder.record(&frame);
                }
                on_frame(&frame);
            }
        }
    }

    fn require_subscribed(&self) -> Result<()> {
        if self.state != SessionState::Subscribed {
            return Err(Error::Protocol(format!(
                "telemetry requires a subscribed session (state: {})",
                self.state
            )));
        }
        Ok(())
    }

    // -- teardown -----------------------------------------------------------

    /// Tear the session down: unsubscribe, close the service session, and
    /// close the transport. Idempotent; each step is attempted even if an
    /// earlier one fails, so partial teardown never leaks the connection.
    pub async fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Unsubscribing;

        if let Some(handle) = self.handle.take() {
            let params = codec::unsubscribe_params(&handle, &self.config.streams);
            match self.call(methods::UNSUBSCRIBE, Some(&params)).await {
                Ok(resp) if resp.is_error() => {
                    warn!(response = %raw_json(&resp), "Unsubscribe rejected")
                }
                Ok(_) => debug!("Streams unsubscribed"),
                Err(e) => warn!(error = %e, "Unsubscribe failed"),
            }

            let params = codec::close_session_params(&handle);
            match self.call(methods::UPDATE_SESSION, Some(&params)).await {
                Ok(resp) if resp.is_error() => {
                    warn!(response = %raw_json(&resp), "Session close rejected")
                }
                Ok(_) => debug!(session_id = %handle.session_id, "Session closed"),
                Err(e) => warn!(error = %e, "Session close failed"),
            }
        }

        if let Err(e) = self.client.close().await {
            warn!(error = %e, "Transport close failed");
        }

        self.state = SessionState::Closed;
        info!("Session shut down");
    }

    /// Establish, collect for `duration`, and shut down, in one call.
    ///
    /// Teardown runs regardless of whether collection succeeded.
    pub async fn run_collection(&mut self, duration: Duration) -> Result<BandAverages> {
        self.establish().await?;
        let result = self.collect(duration).await;
        self.shutdown().await;
        result
    }
}

impl std::fmt::Debug for CortexSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CortexSession")
            .field("state", &self.state)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Single-line rendering of a response frame for logs and error messages.
fn raw_json(resp: &RpcResponse) -> String {
    resp.raw.to_string()
}
