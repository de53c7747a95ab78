//! Outlier-rejecting band-power aggregation.
//!
//! Accumulates decoded band-power samples over a collection window and
//! reduces them to one pooled average per frequency band. Before pooling,
//! each (channel, band) series is cleaned with a sigma-based outlier
//! filter so transient electrode artifacts do not skew the averages.

use std::collections::HashMap;

use tracing::{debug, warn};

use mindlink_core::{Band, BandAverages, Channel, Error, Result};

use crate::decoder::PowerFrame;

// ---------------------------------------------------------------------------
// Tuning constants
// ---------------------------------------------------------------------------

/// Minimum decoded frames required for a statistically meaningful result.
pub const MIN_SAMPLES_REQUIRED: usize = 50;

/// Samples farther than this many standard deviations from the series mean
/// are treated as artifacts.
pub const OUTLIER_SIGMA: f64 = 3.0;

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Accumulates band-power samples across a collection window.
#[derive(Debug, Default)]
pub struct Accumulator {
    /// Per-channel, per-band sample series in arrival order.
    values: HashMap<Channel, HashMap<Band, Vec<f64>>>,
    /// Total decoded frames recorded.
    frames: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record all samples from one decoded band-power frame.
    pub fn record_frame(&mut self, frame: &PowerFrame) {
        for sample in &frame.frames {
            self.values
                .entry(sample.channel)
                .or_default()
                .entry(sample.band)
                .or_default()
                .push(sample.value);
        }
        self.frames += 1;
    }

    /// Number of decoded frames recorded so far.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Reduce the accumulated samples to pooled per-band averages.
    ///
    /// Each (channel, band) series is outlier-filtered, then all surviving
    /// samples for a band are pooled across channels and averaged. Fails
    /// with [`Error::InsufficientData`] when fewer than `min_samples`
    /// frames were recorded, and with [`Error::AllZero`] when every
    /// average comes out zero (a disconnected or dry-contact headset).
    pub fn finalize(&self, min_samples: usize) -> Result<BandAverages> {
        if self.frames < min_samples {
            warn!(
                collected = self.frames,
                required = min_samples,
                "Not enough frames for a meaningful average"
            );
            return Err(Error::InsufficientData {
                collected: self.frames,
                required: min_samples,
            });
        }

        let mut averages = BandAverages::default();
        for band in Band::ALL {
            let mut pooled: Vec<f64> = Vec::new();
            for channel in Channel::ALL {
                if let Some(series) = self.values.get(&channel).and_then(|m| m.get(&band)) {
                    pooled.extend(filter_outliers(series, OUTLIER_SIGMA));
                }
            }
            let average = if pooled.is_empty() {
                0.0
            } else {
                pooled.iter().sum::<f64>() / pooled.len() as f64
            };
            debug!(band = %band, samples = pooled.len(), average, "Band average computed");
            averages.set(band, average);
        }

        if averages.is_all_zero() {
            warn!("All band averages are zero");
            return Err(Error::AllZero);
        }

        Ok(averages)
    }
}

// ---------------------------------------------------------------------------
// Outlier filtering
// ---------------------------------------------------------------------------

/// Drop samples farther than `sigma` standard deviations from the mean.
///
/// Series too short to characterize (fewer than 3 samples) or with zero
/// variance pass through untouched. If filtering would discard half the
/// series or more, the artifact model is wrong for this data and the
/// original series is kept instead.
pub fn filter_outliers(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.len() < 3 {
        return values.to_vec();
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return values.to_vec();
    }

    let filtered: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| (v - mean).abs() <= sigma * std_dev)
        .collect();

    if (filtered.len() as f64) < values.len() as f64 * 0.5 {
        debug!(
            kept = filtered.len(),
            total = values.len(),
            "Outlier filter would discard too much, keeping original series"
        );
        return values.to_vec();
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindlink_core::ChannelBandFrame;

    /// Build a frame where every (channel, band) sample has `value`.
    fn uniform_frame(value: f64, time: f64) -> PowerFrame {
        let mut frames = Vec::new();
        for channel in Channel::ALL {
            for band in Band::ALL {
                frames.push(ChannelBandFrame {
                    channel,
                    band,
                    value,
                    timestamp: time,
                });
            }
        }
        PowerFrame {
            time,
            sid: None,
            frames,
        }
    }

    // -- filter_outliers ----------------------------------------------------

    #[test]
    fn short_series_passes_through() {
        assert_eq!(filter_outliers(&[1.0, 100.0], 3.0), vec![1.0, 100.0]);
        assert_eq!(filter_outliers(&[], 3.0), Vec::<f64>::new());
    }

    #[test]
    fn zero_variance_passes_through() {
        let values = vec![5.0; 10];
        assert_eq!(filter_outliers(&values, 3.0), values);
    }

    #[test]
    fn single_spike_is_dropped() {
        // 20 samples near 1.0 plus one large spike.
        let mut values = vec![1.0, 1.1, 0.9, 1.0, 1.05, 0.95, 1.0, 1.1, 0.9, 1.0];
        values.extend_from_slice(&[1.0, 1.1, 0.9, 1.0, 1.05, 0.95, 1.0, 1.1, 0.9, 1.0]);
        values.push(1000.0);

        let filtered = filter_outliers(&values, 3.0);
        assert_eq!(filtered.len(), values.len() - 1);
        assert!(filtered.iter().all(|&v| v < 2.0));
    }

    #[test]
    fn lone_spike_in_short_series_survives_three_sigma() {
        // With only five samples the spike dominates the standard
        // deviation: mean 10.8, population std 19.6, so the 3-sigma
        // threshold (58.8) exceeds the spike's deviation (39.2) and
        // nothing is rejected.
        let values = vec![1.0, 1.0, 1.0, 1.0, 50.0];
        let filtered = filter_outliers(&values, 3.0);
        assert_eq!(filtered, values);

        let average = filtered.iter().sum::<f64>() / filtered.len() as f64;
        assert!((average - 10.8).abs() < 1e-9);
    }

    #[test]
    fn excessive_rejection_keeps_original() {
        // Bimodal series: any 3-sigma cut that removed one mode would drop
        // half the samples, so the original must be kept.
        let values = vec![0.0, 0.0, 0.0, 100.0, 100.0, 100.0];
        let filtered = filter_outliers(&values, 0.1);
        assert_eq!(filtered, values);
    }

    // -- Accumulator --------------------------------------------------------

    #[test]
    fn insufficient_frames_is_an_error() {
        let mut acc = Accumulator::new();
        for i in 0..10 {
            acc.record_frame(&uniform_frame(1.0, i as f64));
        }

        let result = acc.finalize(50);
        match result {
            Err(Error::InsufficientData {
                collected,
                required,
            }) => {
                assert_eq!(collected, 10);
                assert_eq!(required, 50);
            }
            other => panic!("expected InsufficientData, got: {:?}", other),
        }
    }

    #[test]
    fn uniform_samples_average_to_value() {
        let mut acc = Accumulator::new();
        for i in 0..60 {
            acc.record_frame(&uniform_frame(2.5, i as f64));
        }
        assert_eq!(acc.frame_count(), 60);

        let averages = acc.finalize(50).unwrap();
        for band in Band::ALL {
            assert!((averages.get(band) - 2.5).abs() < 1e-9);
        }
    }

    #[test]
    fn all_zero_averages_is_an_error() {
        let mut acc = Accumulator::new();
        for i in 0..60 {
            acc.record_frame(&uniform_frame(0.0, i as f64));
        }

        assert!(matches!(acc.finalize(50), Err(Error::AllZero)));
    }

    #[test]
    fn averages_pool_across_channels() {
        // Channel AF3 contributes 1.0 to delta, channel AF4 contributes 3.0;
        // the pooled delta average is 2.0.
        let mut acc = Accumulator::new();
        for i in 0..60 {
            acc.record_frame(&PowerFrame {
                time: i as f64,
                sid: None,
                frames: vec![
                    ChannelBandFrame {
                        channel: Channel::AF3,
                        band: Band::Delta,
                        value: 1.0,
                        timestamp: i as f64,
                    },
                    ChannelBandFrame {
                        channel: Channel::AF4,
                        band: Band::Delta,
                        value: 3.0,
                        timestamp: i as f64,
                    },
                ],
            });
        }

        let averages = acc.finalize(50).unwrap();
        assert!((averages.get(Band::Delta) - 2.0).abs() < 1e-9);
        // Bands with no samples average to zero.
        assert_eq!(averages.get(Band::Gamma), 0.0);
    }

    #[test]
    fn spike_does_not_skew_average() {
        let mut acc = Accumulator::new();
        for i in 0..60 {
            acc.record_frame(&uniform_frame(1.0 + (i % 3) as f64 * 0.01, i as f64));
        }
        // One frame with a massive artifact on every series.
        acc.record_frame(&uniform_frame(10_000.0, 61.0));

        let averages = acc.finalize(50).unwrap();
        for band in Band::ALL {
            assert!(
                averages.get(band) < 2.0,
                "band {} average skewed: {}",
                band,
                averages.get(band)
            );
        }
    }

    #[test]
    fn frame_count_tracks_recorded_frames() {
        let mut acc = Accumulator::new();
        assert_eq!(acc.frame_count(), 0);
        acc.record_frame(&uniform_frame(1.0, 0.0));
        acc.record_frame(&uniform_frame(1.0, 1.0));
        assert_eq!(acc.frame_count(), 2);
    }
}
