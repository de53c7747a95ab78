//! CSV telemetry logging.
//!
//! [`FrameRecorder`] appends one row per decoded telemetry frame to a CSV
//! file, capturing receive time, stream name, service timestamp, and the
//! payload as JSON. Recording is best-effort: a failed write is logged and
//! swallowed so disk trouble never interrupts a live collection.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use mindlink_core::{Result, StreamKind};

use crate::decoder::DecodedFrame;

/// CSV column headers, written once when the file is created.
const HEADERS: [&str; 4] = ["recv_time_unix", "stream", "stream_time", "payload_json"];

/// Appends decoded telemetry frames to a CSV file.
pub struct FrameRecorder {
    writer: csv::Writer<std::fs::File>,
    path: PathBuf,
}

impl FrameRecorder {
    /// Open (or create) the CSV file at `path` in append mode.
    ///
    /// The header row is written only when the file is newly created, so
    /// repeated runs against the same path keep one header.
    pub fn create(path: &Path) -> Result<Self> {
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::Writer::from_writer(file);

        if is_new {
            if let Err(e) = writer.write_record(HEADERS) {
                warn!(path = %path.display(), error = %e, "Failed to write CSV header");
            }
        }

        debug!(path = %path.display(), new_file = is_new, "Telemetry recording enabled");
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append one decoded frame. Write failures are logged, not returned.
    pub fn record(&mut self, frame: &DecodedFrame) {
        let recv_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let (stream, stream_time, payload_json) = match frame {
            DecodedFrame::Power(p) => {
                let payload = serde_json::to_string(&p.frames).unwrap_or_default();
                (StreamKind::Pow.as_str(), p.time.to_string(), payload)
            }
            DecodedFrame::Raw(r) => {
                let time = r.time.map(|t| t.to_string()).unwrap_or_default();
                (StreamKind::Eeg.as_str(), time, r.samples.to_string())
            }
        };

        let row = [
            recv_time.to_string(),
            stream.to_string(),
            stream_time,
            payload_json,
        ];
        if let Err(e) = self.writer.write_record(&row) {
            warn!(path = %self.path.display(), error = %e, "Failed to record frame");
            return;
        }
        if let Err(e) = self.writer.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to flush recording");
        }
    }

    /// The file this recorder writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FrameRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRecorder")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{PowerFrame, RawEegFrame};
    use mindlink_core::{Band, Channel, ChannelBandFrame};
    use serde_json::json;

    fn power_frame() -> DecodedFrame {
        DecodedFrame::Power(PowerFrame {
            time: 123.5,
            sid: Some("s".to_string()),
            frames: vec![ChannelBandFrame {
                channel: Channel::AF3,
                band: Band::Alpha,
                value: 0.75,
                timestamp: 123.5,
            }],
        })
    }

    #[test]
    fn records_power_frame_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.csv");

        let mut recorder = FrameRecorder::create(&path).unwrap();
        assert_eq!(recorder.path(), path);
        recorder.record(&power_frame());
        drop(recorder);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "recv_time_unix,stream,stream_time,payload_json"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("pow"));
        assert!(row.contains("123.5"));
        assert!(row.contains("alpha"));
    }

    #[test]
    fn records_raw_eeg_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.csv");

        let mut recorder = FrameRecorder::create(&path).unwrap();
        recorder.record(&DecodedFrame::Raw(RawEegFrame {
            time: Some(9.0),
            sid: None,
            samples: json!([1, 2, 3]),
        }));
        drop(recorder);

        let content = std::fs::read_to_string(&path).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.contains("eeg"));
        assert!(row.contains("[1,2,3]"));
    }

    #[test]
    fn append_does_not_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.csv");

        {
            let mut recorder = FrameRecorder::create(&path).unwrap();
            recorder.record(&power_frame());
        }
        {
            let mut recorder = FrameRecorder::create(&path).unwrap();
            recorder.record(&power_frame());
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let headers = content
            .lines()
            .filter(|l| l.starts_with("recv_time_unix"))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn create_fails_on_bad_path() {
        let result = FrameRecorder::create(Path::new("/nonexistent-dir/frames.csv"));
        assert!(result.is_err());
    }
}
