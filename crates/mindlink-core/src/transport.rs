//! Transport trait for acquisition-service communication.
//!
//! The [`Transport`] trait abstracts over the bidirectional text-frame
//! channel to the service. The production implementation is a TLS
//! WebSocket in `mindlink-transport`; tests use the scripted mock from
//! `mindlink-test-harness`.
//!
//! The protocol engine (`mindlink-cortex`) operates on a `Transport`
//! rather than directly on a socket, enabling both real device sessions
//! and deterministic unit testing.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous text-frame transport to the acquisition service.
///
/// Implementations handle framing and connection lifecycle; protocol-level
/// concerns (request correlation, handshake sequencing) live in the engine
/// that consumes this trait.
///
/// The trait takes `&mut self` throughout: exactly one execution context
/// owns the connection, which is what keeps frame order intact for
/// request/response correlation.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame to the service.
    ///
    /// Returns [`Error::ConnectionLost`](crate::error::Error::ConnectionLost)
    /// on a broken connection and
    /// [`Error::NotConnected`](crate::error::Error::NotConnected) after
    /// [`close`](Transport::close).
    async fn send(&mut self, text: &str) -> Result<()>;

    /// Receive the next text frame from the service.
    ///
    /// Waits up to `timeout`; returns
    /// [`Error::Timeout`](crate::error::Error::Timeout) if no frame arrives
    /// within the deadline. A receive timeout is a keepalive condition, not
    /// a connection failure — callers on the streaming path retry it.
    async fn receive(&mut self, timeout: Duration) -> Result<String>;

    /// Close the transport connection. Idempotent: closing an
    /// already-closed transport returns `Ok` and has no effect.
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
