//! Error types for mindlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! data-quality errors are all captured here.

use std::fmt;

/// The handshake step that produced a protocol failure.
///
/// Carried inside [`Error::Handshake`] so that callers can distinguish,
/// for example, a restricted-stream subscribe rejection (a good reason to
/// fall back to a simulated data source) from a device that was simply
/// not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
    /// `requestAccess` — application access request.
    RequestAccess,
    /// `authorize` — credential exchange for the auth token.
    Authorize,
    /// `queryHeadsets` — device discovery.
    QueryHeadsets,
    /// `createSession` — session open.
    CreateSession,
    /// `subscribe` — data stream subscription.
    Subscribe,
    /// `unsubscribe` — data stream teardown.
    Unsubscribe,
    /// `updateSession` with status "close" — session close.
    CloseSession,
}

impl HandshakeStep {
    /// The wire method name for this step.
    pub fn method(&self) -> &'static str {
        match self {
            HandshakeStep::RequestAccess => "requestAccess",
            HandshakeStep::Authorize => "authorize",
            HandshakeStep::QueryHeadsets => "queryHeadsets",
            HandshakeStep::CreateSession => "createSession",
            HandshakeStep::Subscribe => "subscribe",
            HandshakeStep::Unsubscribe => "unsubscribe",
            HandshakeStep::CloseSession => "updateSession",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// The error type for all mindlink operations.
///
/// Variants cover the full range of failure modes encountered when talking
/// to a local acquisition service: physical transport failures, control-call
/// timeouts, protocol-level handshake rejections, and end-of-window data
/// quality checks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TLS failure, connection refused, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed frame, unexpected response shape).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a response to a control call.
    ///
    /// This typically indicates the acquisition service is not running or
    /// the companion app holding the device is unresponsive.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection has been established, or the transport was closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the service was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A handshake step was answered but did not satisfy its postcondition
    /// (no token, no session id, empty device list, restricted stream).
    ///
    /// Carries the raw response so callers can log it or decide on a
    /// fallback data source.
    #[error("handshake step {step} failed: {response}")]
    Handshake {
        /// Which step of the session-establishment sequence failed.
        step: HandshakeStep,
        /// The raw response JSON (or a description of what was missing).
        response: String,
    },

    /// A collection window closed with fewer decoded frames than required.
    #[error("insufficient samples: collected {collected}, required {required}")]
    InsufficientData {
        /// Frames decoded during the window.
        collected: usize,
        /// The minimum frame count for a valid aggregate.
        required: usize,
    },

    /// Every band average came out exactly zero — a disconnected or
    /// miswired device, not genuine zero activity.
    #[error("all band averages are zero")]
    AllZero,

    /// An invalid parameter was passed to a builder or session call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("connection refused".into());
        assert_eq!(e.to_string(), "transport error: connection refused");
    }

    #[test]
    fn error_display_timeout() {
        let e = Error::Timeout;
        assert_eq!(e.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_handshake() {
        let e = Error::Handshake {
            step: HandshakeStep::Authorize,
            response: "{\"result\":{}}".into(),
        };
        assert_eq!(
            e.to_string(),
            "handshake step authorize failed: {\"result\":{}}"
        );
    }

    #[test]
    fn error_display_insufficient_data() {
        let e = Error::InsufficientData {
            collected: 12,
            required: 50,
        };
        assert_eq!(e.to_string(), "insufficient samples: collected 12, required 50");
    }

    #[test]
    fn error_display_all_zero() {
        assert_eq!(Error::AllZero.to_string(), "all band averages are zero");
    }

    #[test]
    fn handshake_step_methods() {
        assert_eq!(HandshakeStep::RequestAccess.method(), "requestAccess");
        assert_eq!(HandshakeStep::Authorize.method(), "authorize");
        assert_eq!(HandshakeStep::QueryHeadsets.method(), "queryHeadsets");
        assert_eq!(HandshakeStep::CreateSession.method(), "createSession");
        assert_eq!(HandshakeStep::Subscribe.method(), "subscribe");
        assert_eq!(HandshakeStep::Unsubscribe.method(), "unsubscribe");
        assert_eq!(HandshakeStep::CloseSession.method(), "updateSession");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
