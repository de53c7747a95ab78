//! Shared domain types: channels, frequency bands, decoded frames,
//! credentials, and session identity.
//!
//! The channel and band sets are fixed and ordered — the acquisition
//! service packs band-power telemetry as a flat numeric vector laid out
//! channel-major in exactly these orders.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// An electrode location on the acquisition headset.
///
/// The five-channel set matches the consumer headsets this engine targets
/// (frontal AF3/AF4, temporal T7/T8, parietal Pz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    /// Left frontal.
    AF3,
    /// Right frontal.
    AF4,
    /// Left temporal.
    T7,
    /// Right temporal.
    T8,
    /// Parietal midline.
    Pz,
}

impl Channel {
    /// All channels in wire order.
    pub const ALL: [Channel; 5] = [
        Channel::AF3,
        Channel::AF4,
        Channel::T7,
        Channel::T8,
        Channel::Pz,
    ];

    /// Number of channels in the fixed set.
    pub const COUNT: usize = Self::ALL.len();

    /// The channel label as it appears on the wire (e.g. `"AF3"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::AF3 => "AF3",
            Channel::AF4 => "AF4",
            Channel::T7 => "T7",
            Channel::T8 => "T8",
            Channel::Pz => "Pz",
        }
    }

    /// The channel at position `index` in wire order, if in range.
    pub fn from_index(index: usize) -> Option<Channel> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChannelError(pub String);

impl fmt::Display for ParseChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown channel: {}", self.0)
    }
}

impl std::error::Error for ParseChannelError {}

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ParseChannelError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// A named spectral frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// 0.5–4 Hz.
    Delta,
    /// 4–8 Hz.
    Theta,
    /// 8–12 Hz.
    Alpha,
    /// 12–30 Hz.
    Beta,
    /// 30+ Hz.
    Gamma,
}

impl Band {
    /// All bands in wire order.
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Number of bands in the fixed set.
    ///
    /// Decoded band-power vectors must have a length that is an exact
    /// multiple of this count.
    pub const COUNT: usize = Self::ALL.len();

    /// The band name as it appears on the wire (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    /// The band at position `index` in wire order, if in range.
    pub fn from_index(index: usize) -> Option<Band> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBandError(pub String);

impl fmt::Display for ParseBandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown band: {}", self.0)
    }
}

impl std::error::Error for ParseBandError {}

impl FromStr for Band {
    type Err = ParseBandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Band::ALL
            .iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ParseBandError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// A named telemetry stream offered by the acquisition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Band-power telemetry (`"pow"`), the primary stream.
    Pow,
    /// Raw EEG samples (`"eeg"`), optional, forwarded for archival.
    Eeg,
}

impl StreamKind {
    /// The stream name as it appears in subscribe/unsubscribe params and
    /// as the discriminant key of its notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Pow => "pow",
            StreamKind::Eeg => "eeg",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Frames and averages
// ---------------------------------------------------------------------------

/// One decoded band-power measurement: a single (channel, band) value from
/// one telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelBandFrame {
    /// The electrode the value belongs to.
    pub channel: Channel,
    /// The spectral band the value belongs to.
    pub band: Band,
    /// The band power value.
    pub value: f64,
    /// Stream timestamp (seconds, as reported by the service).
    pub timestamp: f64,
}

/// Per-band averages pooled across all channels — the single artifact this
/// engine exposes to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BandAverages {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandAverages {
    /// The average for one band.
    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    /// Set the average for one band.
    pub fn set(&mut self, band: Band, value: f64) {
        match band {
            Band::Delta => self.delta = value,
            Band::Theta => self.theta = value,
            Band::Alpha => self.alpha = value,
            Band::Beta => self.beta = value,
            Band::Gamma => self.gamma = value,
        }
    }

    /// `true` if every band average is exactly `0.0` — the placeholder used
    /// for "no data", and the signature of a disconnected device.
    pub fn is_all_zero(&self) -> bool {
        Band::ALL.iter().all(|b| self.get(*b) == 0.0)
    }

    /// Iterate bands in wire order with their averages.
    pub fn iter(&self) -> impl Iterator<Item = (Band, f64)> + '_ {
        Band::ALL.iter().map(move |b| (*b, self.get(*b)))
    }
}

// ---------------------------------------------------------------------------
// Credentials and session identity
// ---------------------------------------------------------------------------

/// Application credentials for the acquisition service.
///
/// The secret is redacted from `Debug` output so credentials can be carried
/// through configs and logs safely.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Create credentials from a client id/secret pair.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Credentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// The application client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The application client secret.
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// An opaque authorization token, obtained once per session and required on
/// every privileged request. Redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token string received from the service.
    pub fn new(token: impl Into<String>) -> Self {
        AuthToken(token.into())
    }

    /// The raw token string for request parameters.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<redacted>, len={})", self.0.len())
    }
}

/// The identity of one open streaming session: device, session id, and the
/// token that authorizes operations on it.
///
/// Valid only between a successful session open and the first of
/// {explicit close, transport error}; the engine never reuses the
/// identifiers after teardown.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Session id returned by the session-open step.
    pub session_id: String,
    /// The device the session is bound to.
    pub headset_id: String,
    /// The authorization token for privileged calls.
    pub token: AuthToken,
}
