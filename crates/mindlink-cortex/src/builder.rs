//! Fluent builder for [`CortexSession`].
//!
//! # Example
//!
//! ```no_run
//! use mindlink_cortex::CortexSessionBuilder;
//! use mindlink_core::Credentials;
//! use std::time::Duration;
//!
//! # async fn example() -> mindlink_core::Result<()> {
//! let mut session = CortexSessionBuilder::new()
//!     .credentials(Credentials::new("client-id", "client-secret"))
//!     .record_to("telemetry.csv")
//!     .connect()
//!     .await?;
//!
//! let averages = session.run_collection(Duration::from_secs(30)).await?;
//! println!("alpha: {:.3}", averages.alpha);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use mindlink_core::{Credentials, Error, Result, StreamKind, Transport};
use mindlink_transport::{WsOptions, WsTransport};

use crate::client::CortexClient;
use crate::recorder::FrameRecorder;
use crate::session::{CortexSession, SessionConfig};

/// Default service endpoint. The service terminates TLS locally with a
/// self-signed certificate.
pub const DEFAULT_CORTEX_URL: &str = "wss://localhost:6868";

/// Builder for configuring and connecting a [`CortexSession`].
#[derive(Debug, Default)]
pub struct CortexSessionBuilder {
    url: Option<String>,
    credentials: Option<Credentials>,
    streams: Option<Vec<StreamKind>>,
    accept_invalid_certs: Option<bool>,
    connect_timeout: Option<Duration>,
    call_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    min_samples: Option<usize>,
    record_to: Option<PathBuf>,
}

impl CortexSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service endpoint URL. Defaults to [`DEFAULT_CORTEX_URL`].
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Application credentials. Required.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Streams to subscribe to. Defaults to band power only.
    pub fn streams(mut self, streams: Vec<StreamKind>) -> Self {
        self.streams = Some(streams);
        self
    }

    /// Whether to accept a self-signed service certificate. Defaults to
    /// `true`, which is required for the stock local service.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = Some(accept);
        self
    }

    /// Connection/upgrade timeout. Defaults to 10 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Per-request timeout for handshake and teardown calls. Defaults to
    /// 10 seconds.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Timeout for one telemetry wait on the streaming path. Defaults to
    /// 1 second.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Minimum decoded frames for a collection window to succeed.
    /// Defaults to 50.
    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = Some(min_samples);
        self
    }

    /// Record every decoded telemetry frame to a CSV file at `path`.
    pub fn record_to(mut self, path: impl AsRef<Path>) -> Self {
        self.record_to = Some(path.as_ref().to_path_buf());
        self
    }

    /// Connect to the service and return an unestablished session.
    ///
    /// Call [`establish`](CortexSession::establish) (or
    /// [`run_collection`](CortexSession::run_collection)) on the result to
    /// run the handshake.
    pub async fn connect(self) -> Result<CortexSession> {
        let url = self
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_CORTEX_URL.to_string());
        let options = WsOptions {
            accept_invalid_certs: self.accept_invalid_certs.unwrap_or(true),
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(10)),
        };

        debug!(url = %url, "Connecting session");
        let transport = WsTransport::connect(&url, &options).await?;
        self.build_with_transport(Box::new(transport))
    }

    /// Build a session over an already-connected transport.
    ///
    /// This is the seam used by tests to substitute a mock transport; it
    /// performs no I/O.
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<CortexSession> {
        let credentials = self
            .credentials
            .ok_or_else(|| Error::InvalidParameter("credentials are required".to_string()))?;

        let mut config = SessionConfig::new(credentials);
        if let Some(streams) = self.streams {
            if streams.is_empty() {
                return Err(Error::InvalidParameter(
                    "at least one stream is required".to_string(),
                ));
            }
            config.streams = streams;
        }
        if let Some(timeout) = self.call_timeout {
            config.call_timeout = timeout;
        }
        if let Some(timeout) = self.receive_timeout {
            config.receive_timeout = timeout;
        }
        if let Some(min_samples) = self.min_samples {
            config.min_samples = min_samples;
        }

        let recorder = match &self.record_to {
            Some(path) => Some(FrameRecorder::create(path)?),
            None => None,
        };

        Ok(CortexSession::new(
            CortexClient::new(transport),
            config,
            recorder,
        ))
    }
}
