//! mindlink-cortex: JSON-RPC protocol engine for the Cortex acquisition
//! service.
//!
//! Drives a complete acquisition workflow over one WebSocket connection:
//! the authentication/session handshake, request/response correlation amid
//! interleaved telemetry, band-power decoding, outlier-rejecting
//! aggregation, optional CSV recording, and deterministic teardown.
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
//!     .connect()
//!     .await?;
//!
//! let averages = session.run_collection(Duration::from_secs(30)).await?;
//! for (band, value) in averages.iter() {
//!     println!("{}: {:.3}", band, value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod builder;
pub mod client;
pub mod codec;
pub mod decoder;
pub mod recorder;
pub mod session;

pub use aggregator::{Accumulator, MIN_SAMPLES_REQUIRED, OUTLIER_SIGMA};
pub use builder::{CortexSessionBuilder, DEFAULT_CORTEX_URL};
pub use client::CortexClient;
pub use decoder::{DecodedFrame, PowerFrame, RawEegFrame, StreamDecoder};
pub use recorder::FrameRecorder;
pub use session::{CortexSession, SessionConfig, SessionState};
