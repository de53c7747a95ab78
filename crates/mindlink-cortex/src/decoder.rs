//! Telemetry frame decoding.
//!
//! Turns raw [`Notification`]s into typed frames. Band-power (`pow`)
//! payloads are unpacked into per-channel, per-band samples; raw EEG
//! (`eeg`) payloads are passed through untyped for recording.
//!
//! Malformed telemetry is logged and discarded, never escalated: one bad
//! frame from the service must not abort a collection run.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, trace};

use mindlink_core::{Band, Channel, ChannelBandFrame, StreamKind};

use crate::codec::{Notification, PowPayload};

// ---------------------------------------------------------------------------
// Decoded frame types
// ---------------------------------------------------------------------------

/// One decoded band-power frame: a full vector of channel/band samples.
#[derive(Debug, Clone)]
pub struct PowerFrame {
    /// Service-side timestamp, or local receive time if absent.
    pub time: f64,
    /// Session id, if the frame carried one.
    pub sid: Option<String>,
    /// One sample per (channel, band) pair present in the payload.
    pub frames: Vec<ChannelBandFrame>,
}

/// One raw EEG frame, passed through without interpretation.
#[derive(Debug, Clone)]
pub struct RawEegFrame {
    pub time: Option<f64>,
    pub sid: Option<String>,
    /// The untouched `eeg` payload.
    pub samples: Value,
}

/// A decoded telemetry frame.
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Power(PowerFrame),
    Raw(RawEegFrame),
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Stateless telemetry decoder.
#[derive(Debug, Default, Clone)]
pub struct StreamDecoder;

impl StreamDecoder {
    pub fn new() -> Self {
        StreamDecoder
    }

    /// Decode one notification, or `None` if it carries no recognized
    /// stream or its payload is malformed.
    pub fn decode(&self, notification: &Notification) -> Option<DecodedFrame> {
        if let Some(payload) = notification.stream_payload(StreamKind::Pow) {
            return self.decode_pow(notification, payload);
        }
        if let Some(payload) = notification.stream_payload(StreamKind::Eeg) {
            return Some(DecodedFrame::Raw(RawEegFrame {
                time: notification.time(),
                sid: notification.sid().map(str::to_string),
                samples: payload.clone(),
            }));
        }
        trace!("Notification carries no recognized stream, skipping");
        None
    }

    fn decode_pow(&self, notification: &Notification, payload: &Value) -> Option<DecodedFrame> {
        let payload: PowPayload = match serde_json::from_value(payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "Malformed pow payload, discarding frame");
                return None;
            }
        };

        let declared = payload
            .columns()
            .and_then(parse_declared_columns);
        let values = payload.into_flat();

        let pairs: Vec<(Channel, Band)> = match declared {
            // Declared column labels win over the fixed layout, but only
            // when the label count matches the value count.
            Some(cols) if cols.len() == values.len() => cols,
            Some(cols) => {
                debug!(
                    cols = cols.len(),
                    values = values.len(),
                    "Column label count does not match value count, discarding frame"
                );
                return None;
            }
            None => fixed_layout(values.len())?,
        };

        let time = notification
            .time()
            .unwrap_or_else(local_unix_time);
        let frames = pairs
            .into_iter()
            .zip(values)
            .map(|((channel, band), value)| ChannelBandFrame {
                channel,
                band,
                value,
                timestamp: time,
            })
            .collect();

        Some(DecodedFrame::Power(PowerFrame {
            time,
            sid: notification.sid().map(str::to_string),
            frames,
        }))
    }
}

/// Parse declared column labels of the form `"<CHANNEL>/<band>"`.
///
/// Returns `None` unless every label parses; a partially-labeled payload
/// falls back to the fixed layout.
fn parse_declared_columns(cols: &[String]) -> Option<Vec<(Channel, Band)>> {
    cols.iter()
        .map(|label| {
            let (channel, band) = label.split_once('/')?;
            Some((channel.parse().ok()?, band.parse().ok()?))
        })
        .collect()
}

/// The fixed vector layout: channels in declaration order, each carrying
/// all bands in order. Index `i` maps to channel `i / 5`, band `i % 5`.
fn fixed_layout(len: usize) -> Option<Vec<(Channel, Band)>> {
    if len == 0 || len % Band::COUNT != 0 {
        debug!(len, "Pow vector length not divisible by band count, discarding frame");
        return None;
    }

    let mut pairs = Vec::with_capacity(len);
    for i in 0..len {
        let ch_idx = i / Band::COUNT;
        let Some(channel) = Channel::from_index(ch_idx) else {
            // More channel groups than the known montage; keep what mapped.
            trace!(ch_idx, "Vector extends past known channels, truncating");
            break;
        };
        // i % Band::COUNT is always in range.
        let Some(band) = Band::from_index(i % Band::COUNT) else {
            return None;
        };
        pairs.push((channel, band));
    }
    Some(pairs)
}

/// Local wall-clock time as Unix seconds, for frames without a timestamp.
fn local_unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse_frame, Frame};
    use serde_json::json;

    fn notification(value: Value) -> Notification {
        match parse_frame(&value.to_string()).unwrap() {
            Frame::Notification(n) => n,
            Frame::Response(_) => panic!("expected notification"),
        }
    }

    /// A full 25-element flat vector: value = channel_index * 10 + band_index.
    fn full_flat_vector() -> Vec<f64> {
        (0..25)
            .map(|i| (i / 5 * 10 + i % 5) as f64)
            .collect()
    }

    #[test]
    fn decode_flat_pow_vector() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({"pow": full_flat_vector(), "sid": "s", "time": 100.5}));

        let DecodedFrame::Power(frame) = decoder.decode(&n).unwrap() else {
            panic!("expected power frame");
        };
        assert_eq!(frame.time, 100.5);
        assert_eq!(frame.sid.as_deref(), Some("s"));
        assert_eq!(frame.frames.len(), 25);

        // Index 0: first channel, first band.
        assert_eq!(frame.frames[0].channel, Channel::AF3);
        assert_eq!(frame.frames[0].band, Band::Delta);
        assert_eq!(frame.frames[0].value, 0.0);

        // Index 7: second channel, third band.
        assert_eq!(frame.frames[7].channel, Channel::AF4);
        assert_eq!(frame.frames[7].band, Band::Alpha);
        assert_eq!(frame.frames[7].value, 12.0);

        // Index 24: last channel, last band.
        assert_eq!(frame.frames[24].channel, Channel::Pz);
        assert_eq!(frame.frames[24].band, Band::Gamma);
        assert_eq!(frame.frames[24].value, 44.0);
    }

    #[test]
    fn decode_table_with_declared_columns() {
        let decoder = StreamDecoder::new();
        // Declared order deliberately differs from the fixed layout.
        let n = notification(json!({
            "pow": {
                "cols": ["Pz/gamma", "AF3/delta"],
                "values": [[9.0, 1.0]],
            },
            "time": 5.0,
        }));

        let DecodedFrame::Power(frame) = decoder.decode(&n).unwrap() else {
            panic!("expected power frame");
        };
        assert_eq!(frame.frames.len(), 2);
        assert_eq!(frame.frames[0].channel, Channel::Pz);
        assert_eq!(frame.frames[0].band, Band::Gamma);
        assert_eq!(frame.frames[0].value, 9.0);
        assert_eq!(frame.frames[1].channel, Channel::AF3);
        assert_eq!(frame.frames[1].band, Band::Delta);
    }

    #[test]
    fn unparseable_columns_fall_back_to_fixed_layout() {
        let decoder = StreamDecoder::new();
        let cols: Vec<String> = (0..25).map(|i| format!("col{}", i)).collect();
        let n = notification(json!({
            "pow": {"cols": cols, "values": [full_flat_vector()]},
            "time": 1.0,
        }));

        let DecodedFrame::Power(frame) = decoder.decode(&n).unwrap() else {
            panic!("expected power frame");
        };
        // Fixed layout applied: 25 samples, first is AF3/delta.
        assert_eq!(frame.frames.len(), 25);
        assert_eq!(frame.frames[0].channel, Channel::AF3);
        assert_eq!(frame.frames[0].band, Band::Delta);
    }

    #[test]
    fn indivisible_vector_is_discarded() {
        let decoder = StreamDecoder::new();
        // 23 values: not a multiple of the band count.
        let values: Vec<f64> = (0..23).map(|i| i as f64).collect();
        let n = notification(json!({"pow": values, "time": 1.0}));
        assert!(decoder.decode(&n).is_none());
    }

    #[test]
    fn empty_vector_is_discarded() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({"pow": [], "time": 1.0}));
        assert!(decoder.decode(&n).is_none());
    }

    #[test]
    fn vector_longer_than_montage_is_truncated() {
        let decoder = StreamDecoder::new();
        // 30 values: 6 channel groups, but only 5 channels are known.
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let n = notification(json!({"pow": values, "time": 1.0}));

        let DecodedFrame::Power(frame) = decoder.decode(&n).unwrap() else {
            panic!("expected power frame");
        };
        assert_eq!(frame.frames.len(), 25);
    }

    #[test]
    fn malformed_payload_is_discarded() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({"pow": "garbage", "time": 1.0}));
        assert!(decoder.decode(&n).is_none());
    }

    #[test]
    fn mismatched_column_count_is_discarded() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({
            "pow": {"cols": ["AF3/delta", "AF3/theta"], "values": [[1.0]]},
            "time": 1.0,
        }));
        assert!(decoder.decode(&n).is_none());
    }

    #[test]
    fn missing_time_uses_local_clock() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({"pow": full_flat_vector()}));

        let DecodedFrame::Power(frame) = decoder.decode(&n).unwrap() else {
            panic!("expected power frame");
        };
        assert!(frame.time > 0.0);
    }

    #[test]
    fn decode_raw_eeg_passthrough() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({"eeg": [1, 2, 3, 4], "sid": "s", "time": 7.0}));

        let DecodedFrame::Raw(frame) = decoder.decode(&n).unwrap() else {
            panic!("expected raw frame");
        };
        assert_eq!(frame.time, Some(7.0));
        assert_eq!(frame.samples, json!([1, 2, 3, 4]));
    }

    #[test]
    fn unrecognized_stream_is_skipped() {
        let decoder = StreamDecoder::new();
        let n = notification(json!({"mot": [1.0], "time": 1.0}));
        assert!(decoder.decode(&n).is_none());
    }
}
