//! WebSocket transport for acquisition-service communication.
//!
//! This module provides [`WsTransport`], which implements the [`Transport`]
//! trait over a (typically TLS) WebSocket connection.
//!
//! The acquisition service listens locally (`wss://localhost:6868`) with a
//! self-signed certificate, so certificate validation is disabled by
//! default via [`WsOptions`]. Callers targeting a non-local endpoint must
//! re-enable it with [`WsOptions::accept_invalid_certs`] set to `false`.
//!
//! # Example
//!
//! ```no_run
//! use mindlink_transport::{WsOptions, WsTransport};
//! use mindlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> mindlink_core::Result<()> {
//! let mut transport = WsTransport::connect("wss://localhost:6868", &WsOptions::default()).await?;
//!
//! transport.send("{\"id\":1,\"jsonrpc\":\"2.0\",\"method\":\"getCortexInfo\"}").await?;
//! let frame = transport.receive(Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use mindlink_core::error::{Error, Result};
use mindlink_core::transport::Transport;

/// Default connection timeout (10 seconds).
///
/// Generous enough for the local service to spin up its TLS listener, but
/// short enough that a stopped service is reported promptly.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for establishing a WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsOptions {
    /// Skip TLS certificate and hostname validation.
    ///
    /// Defaults to `true` because the local acquisition service presents a
    /// self-signed certificate. Set to `false` for any non-local endpoint.
    pub accept_invalid_certs: bool,
    /// Maximum time to wait for the connection and WebSocket upgrade.
    pub connect_timeout: Duration,
}

impl Default for WsOptions {
    fn default() -> Self {
        WsOptions {
            accept_invalid_certs: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// The concrete stream type produced by `connect_async_tls_with_config`.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for acquisition-service communication.
///
/// Implements the [`Transport`] trait. The connection is established
/// eagerly via [`connect`](WsTransport::connect); after
/// [`close`](Transport::close) all operations return
/// [`Error::NotConnected`].
#[derive(Debug)]
pub struct WsTransport {
    /// The underlying WebSocket stream, `None` after `close()`.
    stream: Option<WsStream>,
    /// The URL string for logging/debugging.
    url: String,
}

impl WsTransport {
    /// Connect to a WebSocket endpoint.
    ///
    /// The `url` should be a `ws://` or `wss://` URL, e.g.
    /// `"wss://localhost:6868"`.
    pub async fn connect(url: &str, options: &WsOptions) -> Result<Self> {
        tracing::debug!(
            url = %url,
            timeout_ms = options.connect_timeout.as_millis(),
            insecure_tls = options.accept_invalid_certs,
            "Connecting to WebSocket endpoint"
        );

        let connector = if options.accept_invalid_certs {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| Error::Transport(format!("TLS connector setup failed: {}", e)))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let connect = connect_async_tls_with_config(url, None, false, connector);
        let (stream, response) = tokio::time::timeout(options.connect_timeout, connect)
            .await
            .map_err(|_| {
                tracing::error!(url = %url, "WebSocket connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "WebSocket connection failed");
                map_connect_error(e, url)
            })?;

        tracing::info!(
            url = %url,
            status = response.status().as_u16(),
            "WebSocket connection established"
        );

        Ok(Self {
            stream: Some(stream),
            url: url.to_string(),
        })
    }

    /// Wrap an already-established WebSocket stream as a `WsTransport`.
    ///
    /// Useful when the connection was set up externally (e.g. accepted
    /// from a listener in tests).
    pub fn from_stream(stream: WsStream, url: String) -> Self {
        tracing::debug!(url = %url, "Wrapping existing WebSocket stream");
        Self {
            stream: Some(stream),
            url,
        }
    }

    /// Get the URL this transport was connected to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: &str) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(url = %self.url, len = text.len(), "Sending text frame");

        stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| {
                tracing::error!(url = %self.url, error = %e, "Failed to send frame");
                map_ws_error(e)
            })?;

        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }

            let message = match tokio::time::timeout(remaining, stream.next()).await {
                Err(_) => {
                    tracing::trace!(
                        url = %self.url,
                        timeout_ms = timeout.as_millis(),
                        "Timeout waiting for frame"
                    );
                    return Err(Error::Timeout);
                }
                Ok(None) => {
                    tracing::warn!(url = %self.url, "WebSocket stream ended");
                    return Err(Error::ConnectionLost);
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(url = %self.url, error = %e, "Failed to receive frame");
                    return Err(map_ws_error(e));
                }
                Ok(Some(Ok(m))) => m,
            };

            match message {
                Message::Text(text) => {
                    tracing::trace!(url = %self.url, len = text.len(), "Received text frame");
                    return Ok(text);
                }
                Message::Ping(payload) => {
                    // Answer keepalive pings inline so the service does not
                    // drop a client that is quietly waiting for telemetry.
                    tracing::trace!(url = %self.url, "Ping received, answering with Pong");
                    if let Err(e) = stream.send(Message::Pong(payload)).await {
                        tracing::warn!(url = %self.url, error = %e, "Failed to answer Ping");
                    }
                }
                Message::Pong(_) => {
                    tracing::trace!(url = %self.url, "Pong received");
                }
                Message::Binary(data) => {
                    // The protocol is text-only; binary frames are unexpected.
                    tracing::debug!(url = %self.url, len = data.len(), "Ignoring binary frame");
                }
                Message::Close(frame) => {
                    tracing::debug!(url = %self.url, frame = ?frame, "Close frame received");
                    return Err(Error::ConnectionLost);
                }
                Message::Frame(_) => {
                    tracing::trace!(url = %self.url, "Ignoring raw frame");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(url = %self.url, "Closing WebSocket connection");

            if let Err(e) = stream.close(None).await {
                tracing::warn!(
                    url = %self.url,
                    error = %e,
                    "Failed to close WebSocket cleanly (continuing anyway)"
                );
            }

            tracing::info!(url = %self.url, "WebSocket connection closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

// Log when the transport is dropped while still connected.
impl Drop for WsTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(url = %self.url, "WsTransport dropped, closing connection");
        }
    }
}

/// Map a connection-time WebSocket error to the appropriate [`Error`] variant.
fn map_connect_error(e: WsError, url: &str) -> Error {
    match e {
        WsError::Io(ref io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {}", url))
        }
        WsError::Tls(e) => Error::Transport(format!("TLS handshake failed: {}", e)),
        WsError::Io(io) => Error::Io(io),
        other => Error::Transport(format!("WebSocket connect failed: {}", other)),
    }
}

/// Map a data-path WebSocket error to the appropriate [`Error`] variant.
fn map_ws_error(e: WsError) -> Error {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionLost,
        WsError::Io(io) => match io.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
            _ => Error::Io(io),
        },
        other => Error::Transport(format!("WebSocket error: {}", other)),
    }
}
