//! mindlink-test-harness: Test utilities, mock transports, and a scripted
//! mock service for mindlink.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine without a real acquisition service, and
//! [`MockCortexServer`], a scripted WebSocket service for end-to-end
//! session tests over a real connection.

pub mod mock_cortex;
pub mod mock_transport;

pub use mock_cortex::{MockCortexServer, ServerScript};
pub use mock_transport::{MockTransport, MockTransportHandle};
