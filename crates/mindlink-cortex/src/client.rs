//! Correlated JSON-RPC client over a [`Transport`].
//!
//! [`CortexClient`] owns the connection and is the single reader of inbound
//! frames. Request/response correlation and telemetry delivery share one
//! receive path: while waiting for a response, telemetry frames that arrive
//! interleaved are queued (never dropped) and handed out later in arrival
//! order via [`next_notification`](CortexClient::next_notification).

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use mindlink_core::{Error, Result, Transport};

use crate::codec::{self, Frame, Notification, RpcResponse};

/// Correlated JSON-RPC client over a text-frame transport.
///
/// Exactly one logical reader: all inbound traffic flows through the
/// `&mut self` methods of this type, so frames are classified in arrival
/// order and telemetry ordering is preserved across interleaved calls.
pub struct CortexClient {
    transport: Box<dyn Transport>,
    /// Next correlation id to assign. Strictly increasing, never reused.
    next_id: u64,
    /// Telemetry received while waiting for a response, in arrival order.
    notifications: VecDeque<Notification>,
}

impl CortexClient {
    /// Wrap a connected transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            next_id: 1,
            notifications: VecDeque::new(),
        }
    }

    /// Issue one JSON-RPC call and wait for its correlated response.
    ///
    /// Telemetry frames arriving before the response are queued. A response
    /// whose id does not match the outstanding request is logged and
    /// discarded; ids are never reused, so a late response to a timed-out
    /// call can never be misattributed to a newer one.
    pub async fn call(
        &mut self,
        method: &str,
        params: Option<&Value>,
        timeout: Duration,
    ) -> Result<RpcResponse> {
        if !self.transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let id = self.next_id;
        self.next_id += 1;

        let request = codec::encode_request(id, method, params);
        trace!(id, method, "Sending request");
        self.transport.send(&request).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(id, method, timeout_ms = timeout.as_millis(), "Call timed out");
                return Err(Error::Timeout);
            }

            let text = match self.transport.receive(remaining).await {
                Ok(text) => text,
                Err(Error::Timeout) => {
                    warn!(id, method, timeout_ms = timeout.as_millis(), "Call timed out");
                    return Err(Error::Timeout);
                }
                Err(e) => return Err(e),
            };

            match codec::parse_frame(&text) {
                Ok(Frame::Response(resp)) if resp.id == id => {
                    trace!(id, method, is_error = resp.is_error(), "Response received");
                    return Ok(resp);
                }
                Ok(Frame::Response(resp)) => {
                    // Stale response from an earlier timed-out call.
                    debug!(
                        expected = id,
                        received = resp.id,
                        "Discarding response with unmatched id"
                    );
                }
                Ok(Frame::Notification(n)) => {
                    trace!(id, method, "Queuing telemetry received during call");
                    self.notifications.push_back(n);
                }
                Err(e) => {
                    debug!(error = %e, "Discarding unparseable frame");
                }
            }
        }
    }

    /// Receive the next telemetry notification, draining the queue first.
    ///
    /// Returns `Ok(None)` when no telemetry arrives within `timeout` -- a
    /// keepalive condition on the streaming path, not an error. Stale
    /// responses from timed-out calls are logged and skipped.
    pub async fn next_notification(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Notification>> {
        if let Some(n) = self.notifications.pop_front() {
            return Ok(Some(n));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let text = match self.transport.receive(remaining).await {
                Ok(text) => text,
                Err(Error::Timeout) => return Ok(None),
                Err(e) => return Err(e),
            };

            match codec::parse_frame(&text) {
                Ok(Frame::Notification(n)) => return Ok(Some(n)),
                Ok(Frame::Response(resp)) => {
                    debug!(id = resp.id, "Discarding stale response on telemetry path");
                }
                Err(e) => {
                    debug!(error = %e, "Discarding unparseable frame");
                }
            }
        }
    }

    /// Number of queued telemetry notifications not yet handed out.
    pub fn queued_notifications(&self) -> usize {
        self.notifications.len()
    }

    /// Whether the underlying transport is still connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Close the underlying transport. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

impl std::fmt::Debug for CortexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CortexClient")
            .field("next_id", &self.next_id)
            .field("queued_notifications", &self.notifications.len())
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindlink_test_harness::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn call_returns_matching_response() {
        let (transport, handle) = MockTransport::new();
        handle.push_frame(r#"{"id":1,"jsonrpc":"2.0","result":{"ok":true}}"#);

        let mut client = CortexClient::new(Box::new(transport));
        let resp = client
            .call("getCortexInfo", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.id, 1);
        assert_eq!(resp.result.unwrap()["ok"], true);

        let sent = handle.sent_frames();
        assert_eq!(sent.len(), 1);
        let parsed: Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(parsed["method"], "getCortexInfo");
    }

    #[tokio::test]
    async fn call_queues_interleaved_telemetry() {
        let (transport, handle) = MockTransport::new();
        handle.push_frame(r#"{"pow":[1.0],"time":1.0}"#);
        handle.push_frame(r#"{"pow":[2.0],"time":2.0}"#);
        handle.push_frame(r#"{"id":1,"jsonrpc":"2.0","result":{}}"#);

        let mut client = CortexClient::new(Box::new(transport));
        let resp = client
            .call("subscribe", Some(&json!({})), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.id, 1);

        // Both telemetry frames were queued in arrival order.
        assert_eq!(client.queued_notifications(), 2);
        let first = client
            .next_notification(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.time(), Some(1.0));
        let second = client
            .next_notification(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.time(), Some(2.0));
    }

    #[tokio::test]
    async fn call_discards_stale_response_ids() {
        let (transport, handle) = MockTransport::new();
        handle.push_frame(r#"{"id":99,"jsonrpc":"2.0","result":{}}"#);
        handle.push_frame(r#"{"id":1,"jsonrpc":"2.0","result":{"real":1}}"#);

        let mut client = CortexClient::new(Box::new(transport));
        let resp = client
            .call("authorize", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.id, 1);
        assert_eq!(resp.result.unwrap()["real"], 1);
    }

    #[tokio::test]
    async fn call_times_out_without_response() {
        let (transport, _handle) = MockTransport::new();

        let mut client = CortexClient::new(Box::new(transport));
        let result = client
            .call("authorize", None, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn timeout_leaves_queued_telemetry_intact() {
        let (transport, handle) = MockTransport::new();
        handle.push_frame(r#"{"pow":[1.0],"time":1.0}"#);
        handle.push_frame(r#"{"pow":[2.0],"time":2.0}"#);

        let mut client = CortexClient::new(Box::new(transport));
        let result = client
            .call("authorize", None, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));

        // Telemetry drained while waiting is still queued in order.
        assert_eq!(client.queued_notifications(), 2);
        let first = client
            .next_notification(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.time(), Some(1.0));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_timeout() {
        let (transport, handle) = MockTransport::new();

        let mut client = CortexClient::new(Box::new(transport));
        let _ = client
            .call("authorize", None, Duration::from_millis(20))
            .await;

        // The next call uses a fresh id even though the first got no answer.
        handle.push_frame(r#"{"id":2,"jsonrpc":"2.0","result":{}}"#);
        let resp = client
            .call("queryHeadsets", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.id, 2);
    }

    #[tokio::test]
    async fn next_notification_timeout_is_none_not_error() {
        let (transport, _handle) = MockTransport::new();

        let mut client = CortexClient::new(Box::new(transport));
        let result = client.next_notification(Duration::from_millis(20)).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn next_notification_skips_stale_responses() {
        let (transport, handle) = MockTransport::new();
        handle.push_frame(r#"{"id":42,"jsonrpc":"2.0","result":{}}"#);
        handle.push_frame(r#"{"pow":[3.0],"time":3.0}"#);

        let mut client = CortexClient::new(Box::new(transport));
        let n = client
            .next_notification(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n.time(), Some(3.0));
    }

    #[tokio::test]
    async fn call_on_lost_connection_fails() {
        let (transport, handle) = MockTransport::new();
        handle.lose_connection();

        let mut client = CortexClient::new(Box::new(transport));
        let result = client.call("authorize", None, Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
