//! candump log replay
//!
//! Reads captures written by `candump -L`:
//!
//! ```text
//! (1436509052.249713) can0 5F0#0BB804D20320
//! (1436509052.250712) can0 5F0#00000000FCFBFA00
//! ```
//!
//! Blank lines and `#` comments are skipped. Remote frames carry no payload
//! and are skipped too. Malformed lines are logged and skipped so a damaged
//! capture still replays.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{BusSource, TransportError};
use crate::config::ReplayConfig;
use crate::frame::CanFrame;

/// Longest pause inserted between two frames in realtime mode
pub const MAX_REPLAY_GAP: Duration = Duration::from_secs(1);

/// One parsed log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Capture time in seconds
    pub timestamp: f64,
    pub interface: String,
    pub frame: CanFrame,
}

/// Parse one candump line.
///
/// `Ok(None)` for lines that carry no data frame (blank, comment, remote).
pub fn parse_candump_line(line: &str) -> Result<Option<LogRecord>, TransportError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let (Some(stamp), Some(interface), Some(body)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(TransportError::InvalidFrame(format!(
            "Expected '(timestamp) interface ID#DATA': {}",
            line
        )));
    };

    let timestamp = stamp
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .ok_or_else(|| TransportError::InvalidFrame(format!("Invalid timestamp: {}", stamp)))?;

    let (id_str, data_str) = body
        .split_once('#')
        .ok_or_else(|| TransportError::InvalidFrame(format!("Missing '#': {}", body)))?;

    if data_str.starts_with('#') {
        return Err(TransportError::Unsupported(format!("CAN FD frame: {}", body)));
    }
    if data_str.starts_with('R') || data_str.starts_with('r') {
        return Ok(None);
    }

    let id = u32::from_str_radix(id_str, 16)
        .map_err(|e| TransportError::InvalidFrame(format!("Invalid CAN ID '{}': {}", id_str, e)))?;

    // candump separates bytes with '.' in some modes
    let hex_data: String = data_str.chars().filter(|c| *c != '.').collect();
    let data = hex::decode(&hex_data)
        .map_err(|e| TransportError::InvalidFrame(format!("Invalid payload '{}': {}", data_str, e)))?;

    // candump prints standard ids with 3 digits and extended ids with 8
    let extended = id_str.len() > 3;
    let frame = CanFrame::with_format(id, extended, &data).ok_or_else(|| {
        TransportError::InvalidFrame(format!(
            "Frame out of range (id 0x{:X}, {} bytes)",
            id,
            data.len()
        ))
    })?;

    Ok(Some(LogRecord {
        timestamp,
        interface: interface.to_string(),
        frame,
    }))
}

/// Replays a parsed candump log
pub struct ReplaySource {
    path: PathBuf,
    records: Vec<LogRecord>,
    position: usize,
    realtime: bool,
    speed: f64,
    repeat: bool,
    last_timestamp: Option<f64>,
}

impl ReplaySource {
    /// Load and parse the log named in `config`
    pub async fn open(config: &ReplayConfig) -> Result<Self, TransportError> {
        let text = tokio::fs::read_to_string(&config.path).await.map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to read replay log {}: {}",
                config.path.display(),
                e
            ))
        })?;

        let source = Self::from_log(&config.path, &text, config)?;
        info!(
            path = %config.path.display(),
            frames = source.records.len(),
            realtime = config.realtime,
            repeat = config.repeat,
            "Replay log loaded"
        );
        Ok(source)
    }

    /// Build a replay from log text already in memory
    pub fn from_log(
        path: impl AsRef<Path>,
        text: &str,
        config: &ReplayConfig,
    ) -> Result<Self, TransportError> {
        if !(config.speed.is_finite() && config.speed > 0.0) {
            return Err(TransportError::InvalidConfig(format!(
                "Replay speed must be positive, got {}",
                config.speed
            )));
        }

        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            match parse_candump_line(line) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed log line"),
            }
        }

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            records,
            position: 0,
            realtime: config.realtime,
            speed: config.speed,
            repeat: config.repeat,
            last_timestamp: None,
        })
    }

    /// Number of replayable frames
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn gap_before(&self, timestamp: f64) -> Option<Duration> {
        let previous = self.last_timestamp?;
        let seconds = (timestamp - previous) / self.speed;
        if seconds > 0.0 {
            Duration::try_from_secs_f64(seconds)
                .ok()
                .map(|gap| gap.min(MAX_REPLAY_GAP))
        } else {
            None
        }
    }
}

#[async_trait]
impl BusSource for ReplaySource {
    async fn recv(&mut self) -> Result<Option<CanFrame>, TransportError> {
        if self.position >= self.records.len() {
            if !self.repeat || self.records.is_empty() {
                return Ok(None);
            }
            debug!(path = %self.path.display(), "Replay restarting from the top");
            self.position = 0;
            self.last_timestamp = None;
        }

        let record = &self.records[self.position];
        let (timestamp, frame) = (record.timestamp, record.frame);

        // Nothing is consumed until the pause is over, so a cancelled call
        // yields the same frame next time
        if self.realtime {
            if let Some(gap) = self.gap_before(timestamp) {
                tokio::time::sleep(gap).await;
            }
            self.last_timestamp = Some(timestamp);
        }
        self.position += 1;

        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("replay {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOG: &str = "\
# captured on the dyno
(1700000000.000000) can0 5F0#0BB804D20320

(1700000000.010000) can0 123#R
(1700000000.020000) can0 5F0#00000000FCFBFA00
garbage
(1700000000.030000) can0 18DAF100#027E
";

    #[test]
    fn test_parse_standard_frame() {
        let record = parse_candump_line("(1436509052.249713) vcan0 5F0#0064000AFCFBFA00")
            .unwrap()
            .unwrap();
        assert_eq!(record.interface, "vcan0");
        assert_eq!(record.timestamp, 1436509052.249713);
        assert_eq!(record.frame.id(), 0x5F0);
        assert_eq!(
            record.frame.data(),
            &[0x00, 0x64, 0x00, 0x0A, 0xFC, 0xFB, 0xFA, 0x00]
        );
    }

    #[test]
    fn test_parse_extended_and_empty() {
        let record = parse_candump_line("(0.5) can1 18DAF100#").unwrap().unwrap();
        assert_eq!(record.frame.id(), 0x18DA_F100);
        assert!(record.frame.is_extended());
        assert!(record.frame.is_empty());

        let dotted = parse_candump_line("(0.5) can1 5F0#01.02.03").unwrap().unwrap();
        assert_eq!(dotted.frame.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_parse_skips_non_data_lines() {
        assert_eq!(parse_candump_line("").unwrap(), None);
        assert_eq!(parse_candump_line("   # note").unwrap(), None);
        assert_eq!(parse_candump_line("(1.0) can0 123#R").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for line in [
            "garbage",
            "(abc) can0 5F0#00",
            "1.0 can0 5F0#00",
            "(1.0) can0 5F000",
            "(1.0) can0 XYZ#00",
            "(1.0) can0 5F0#0",
            "(1.0) can0 5F0#000102030405060708",
            "(1.0) can0 3FFFFFFF#00",
        ] {
            assert!(
                matches!(
                    parse_candump_line(line),
                    Err(TransportError::InvalidFrame(_))
                ),
                "accepted {:?}",
                line
            );
        }
        assert!(matches!(
            parse_candump_line("(1.0) can0 5F0##1000102"),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_yields_frames_then_ends() {
        let mut source =
            ReplaySource::from_log("dyno.log", LOG, &ReplayConfig::new("dyno.log")).unwrap();
        assert_eq!(source.len(), 3);

        let mut ids = Vec::new();
        while let Some(frame) = source.recv().await.unwrap() {
            ids.push(frame.id());
        }
        assert_eq!(ids, vec![0x5F0, 0x5F0, 0x18DA_F100]);
        assert!(source.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replay_repeat_wraps() {
        let config = ReplayConfig {
            repeat: true,
            ..ReplayConfig::new("dyno.log")
        };
        let mut source = ReplaySource::from_log("dyno.log", LOG, &config).unwrap();
        for _ in 0..7 {
            assert!(source.recv().await.unwrap().is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_pacing() {
        let config = ReplayConfig {
            realtime: true,
            speed: 2.0,
            ..ReplayConfig::new("dyno.log")
        };
        let mut source = ReplaySource::from_log("dyno.log", LOG, &config).unwrap();

        let start = tokio::time::Instant::now();
        source.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        // 20 ms recorded gap at double speed
        source.recv().await.unwrap();
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(9) && elapsed <= Duration::from_millis(11),
            "elapsed {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_realtime_recv_keeps_frame() {
        let config = ReplayConfig {
            realtime: true,
            ..ReplayConfig::new("dyno.log")
        };
        let mut source = ReplaySource::from_log("dyno.log", LOG, &config).unwrap();
        source.recv().await.unwrap();

        // The next frame is 20 ms away; give up halfway through the pause
        let cancelled = tokio::time::timeout(Duration::from_millis(5), source.recv()).await;
        assert!(cancelled.is_err());

        let frame = source.recv().await.unwrap().unwrap();
        assert_eq!(frame.data(), &[0, 0, 0, 0, 0xFC, 0xFB, 0xFA, 0]);
        assert_eq!(source.recv().await.unwrap().unwrap().id(), 0x18DA_F100);
        assert!(source.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_parse_id_format_from_digit_count() {
        let standard = parse_candump_line("(0.0) can0 5F0#01").unwrap().unwrap();
        assert!(!standard.frame.is_extended());

        let extended = parse_candump_line("(0.0) can0 000005F0#01").unwrap().unwrap();
        assert_eq!(extended.frame.id(), 0x5F0);
        assert!(extended.frame.is_extended());
        assert_ne!(standard.frame, extended.frame);

        // Three digits cannot carry an id above the 11-bit range
        assert!(matches!(
            parse_candump_line("(0.0) can0 800#01"),
            Err(TransportError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_invalid_speed() {
        let config = ReplayConfig {
            speed: 0.0,
            ..ReplayConfig::new("dyno.log")
        };
        assert!(matches!(
            ReplaySource::from_log("dyno.log", LOG, &config),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = ReplaySource::open(&ReplayConfig::new("/nonexistent/dyno.log"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }
}
