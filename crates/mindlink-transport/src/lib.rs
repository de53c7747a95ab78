//! mindlink-transport: WebSocket transport implementation for mindlink.
//!
//! Provides [`WsTransport`], the production [`mindlink_core::Transport`]
//! implementation. The acquisition service terminates TLS locally with a
//! self-signed certificate, so [`WsOptions`] defaults to accepting invalid
//! certificates; plain `ws://` endpoints are also supported (used by the
//! test harness).

pub mod websocket;

pub use websocket::{WsOptions, WsTransport};
