//! Mock transport for deterministic testing of the protocol engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait against an
//! in-memory frame queue. The paired [`MockTransportHandle`] pushes inbound
//! frames and inspects sent frames from the test body while the transport
//! itself is owned by the engine under test.
//!
//! # Example
//!
//! ```
//! use mindlink_test_harness::MockTransport;
//!
//! let (transport, handle) = MockTransport::new();
//! // Queue a frame for the engine to receive, then hand it the transport.
//! handle.push_frame(r#"{"id":1,"jsonrpc":"2.0","result":{}}"#);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use mindlink_core::error::{Error, Result};
use mindlink_core::transport::Transport;

/// How often `receive` polls the queue while waiting for a frame.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct Inner {
    /// Frames waiting to be delivered by `receive()`, in push order.
    inbound: VecDeque<String>,
    /// Log of all frames sent through this transport.
    sent: Vec<String>,
    /// Set by `close()`.
    closed: bool,
    /// Set by `lose_connection()`; simulates an abrupt peer disconnect.
    lost: bool,
}

/// A mock [`Transport`] backed by an in-memory frame queue.
///
/// Created in pairs with a [`MockTransportHandle`]: the transport goes to
/// the engine under test, the handle stays with the test.
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    /// Create a connected mock transport and its test-side handle.
    pub fn new() -> (Self, MockTransportHandle) {
        let inner = Arc::new(Mutex::new(Inner::default()));
        (
            MockTransport {
                inner: inner.clone(),
            },
            MockTransportHandle { inner },
        )
    }
}

impl MockTransportHandle {
    /// Queue a frame for the next `receive()` call.
    pub fn push_frame(&self, frame: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.inbound.push_back(frame.to_string());
        }
    }

    /// All frames sent through the transport so far, in send order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.sent.clone())
            .unwrap_or_default()
    }

    /// Simulate an abrupt peer disconnect: subsequent sends and receives
    /// fail with [`Error::ConnectionLost`].
    pub fn lose_connection(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.lost = true;
        }
    }

    /// Whether the engine has closed the transport.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().map(|inner| inner.closed).unwrap_or(false)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: &str) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::Transport("mock lock poisoned".to_string()))?;
        if inner.closed {
            return Err(Error::NotConnected);
        }
        if inner.lost {
            return Err(Error::ConnectionLost);
        }
        inner.sent.push(text.to_string());
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut inner = self
                    .inner
                    .lock()
                    .map_err(|_| Error::Transport("mock lock poisoned".to_string()))?;
                if inner.closed {
                    return Err(Error::NotConnected);
                }
                if let Some(frame) = inner.inbound.pop_front() {
                    return Ok(frame);
                }
                if inner.lost {
                    return Err(Error::ConnectionLost);
                }
            }

            // Queue is empty; wait for a test-side push or the deadline.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            tokio::time::sleep(remaining.min(POLL_INTERVAL)).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::Transport("mock lock poisoned".to_string()))?;
        inner.closed = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| !inner.closed && !inner.lost)
            .unwrap_or(false)
    }
}
