//! Acquisition configuration
//!
//! Source, decoder and publisher settings as they appear in the daemon's
//! TOML file. All values are read once at startup.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::frame::MAX_EXTENDED_ID;
use crate::sink::SinkFormat;

// =============================================================================
// Source Configuration
// =============================================================================

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Raw SocketCAN interface (Linux only)
    SocketCan(SocketCanConfig),
    /// candump log file
    Replay(ReplayConfig),
    /// Generated frames for bench runs without an ECU
    Simulated(SimulatedConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::SocketCan(SocketCanConfig::default())
    }
}

/// SocketCAN configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketCanConfig {
    /// CAN interface name (e.g., "can0")
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Frames buffered between the socket thread and the decoder
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SocketCanConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

/// candump log replay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Log file path
    pub path: PathBuf,
    /// Reproduce the recorded gaps between frames
    #[serde(default)]
    pub realtime: bool,
    /// Playback speed multiplier for realtime pacing
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Start over at end of file instead of finishing
    #[serde(default)]
    pub repeat: bool,
}

impl ReplayConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            realtime: false,
            speed: default_speed(),
            repeat: false,
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

/// Simulated ECU configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Delay between frames in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Stop after this many rotations; runs until shutdown when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotations: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            rotations: None,
        }
    }
}

fn default_frame_interval_ms() -> u64 {
    10
}

// =============================================================================
// Decoder / Publisher Configuration
// =============================================================================

/// Frame decoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// CAN id carrying the rotating stream (e.g., "0x5F0")
    #[serde(default = "default_source_id")]
    pub source_id: String,
    /// Match 29-bit frames; implied when the id does not fit in 11 bits
    #[serde(default)]
    pub extended_id: bool,
    /// Discard payload until the first rotation marker
    #[serde(default)]
    pub wait_for_sync: bool,
    /// Pause after a transport error before reading again (ms)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            source_id: default_source_id(),
            extended_id: false,
            wait_for_sync: false,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl DecoderConfig {
    /// Parsed source id
    pub fn source_id(&self) -> Result<u32, ConfigError> {
        parse_can_id(&self.source_id)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_source_id() -> String {
    format!("0x{:03X}", telem_channels::M400_SOURCE_ID)
}

fn default_retry_backoff_ms() -> u64 {
    100
}

/// Publisher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Snapshot cadence in milliseconds
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Output file
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Output encoding
    #[serde(default)]
    pub format: SinkFormat,
    /// Hold back snapshots until every channel has been decoded once
    #[serde(default = "default_require_complete")]
    pub require_complete: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            output: default_output(),
            format: SinkFormat::default(),
            require_complete: default_require_complete(),
        }
    }
}

impl PublisherConfig {
    /// Publish period; zero is rejected
    pub fn period(&self) -> Result<Duration, ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::InvalidPeriod(self.period_ms));
        }
        Ok(Duration::from_millis(self.period_ms))
    }
}

fn default_period_ms() -> u64 {
    100
}

fn default_output() -> PathBuf {
    PathBuf::from("telemChannels.json")
}

fn default_require_complete() -> bool {
    true
}

/// Parse a CAN id: hex with `0x` prefix, decimal otherwise
pub fn parse_can_id(s: &str) -> Result<u32, ConfigError> {
    let trimmed = s.trim();
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };

    let id = u32::from_str_radix(digits, radix).map_err(|e| ConfigError::InvalidCanId {
        value: s.to_string(),
        reason: e.to_string(),
    })?;

    if id > MAX_EXTENDED_ID {
        return Err(ConfigError::InvalidCanId {
            value: s.to_string(),
            reason: "exceeds 29 bits".to_string(),
        });
    }

    Ok(id)
}
