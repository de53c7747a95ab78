//! mindlink-core: Core traits, types, and error definitions for mindlink.
//!
//! This crate defines the service-agnostic abstractions shared by the
//! transport layer and the protocol engine. Applications depend on these
//! types without pulling in the WebSocket stack.
//!
//! # Key types
//!
//! - [`Transport`] — text-frame communication channel
//! - [`Channel`] / [`Band`] — the fixed, ordered telemetry layout
//! - [`BandAverages`] — the aggregate artifact exposed to collaborators
//! - [`Error`] / [`Result`] — error handling

pub mod error;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use mindlink_core::*`.
pub use error::{Error, HandshakeStep, Result};
pub use transport::Transport;
pub use types::{
    AuthToken, Band, BandAverages, Channel, ChannelBandFrame, Credentials, ParseBandError,
    ParseChannelError, SessionHandle, StreamKind,
};
