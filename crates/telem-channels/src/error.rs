//! Error types for channel table loading and validation

use thiserror::Error;

/// Errors raised while building or loading a channel table.
///
/// All of these are configuration errors: they are reported once at startup
/// and never while frames are being decoded.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Table has no channels
    #[error("channel table is empty")]
    EmptyTable,

    /// Channel name missing
    #[error("channel at index {index} has an empty name")]
    EmptyName { index: usize },

    /// Two channels share a name
    #[error("duplicate channel name: {0}")]
    DuplicateName(String),

    /// Width outside 1..=8 bytes
    #[error("channel '{name}': width {width} not in 1..=8")]
    InvalidWidth { name: String, width: u8 },

    /// Scale factor is NaN or infinite
    #[error("channel '{name}': scale {scale} is not finite")]
    InvalidScale { name: String, scale: f64 },

    /// Precision too large to be meaningful for an f64
    #[error("channel '{name}': precision {precision} exceeds {max}")]
    InvalidPrecision { name: String, precision: u8, max: u8 },

    /// Offsets not strictly ascending
    #[error("channel '{name}' at offset {offset} does not follow '{previous}' at offset {previous_offset}")]
    Unordered {
        name: String,
        offset: usize,
        previous: String,
        previous_offset: usize,
    },

    /// Channel starts inside the previous channel's bytes
    #[error("channel '{name}' at offset {offset} overlaps '{previous}' ending at {previous_end}")]
    Overlap {
        name: String,
        offset: usize,
        previous: String,
        previous_end: usize,
    },

    /// Channel bytes would cross a frame payload boundary
    #[error("channel '{name}' at offset {offset} with width {width} straddles a {frame_len}-byte frame boundary")]
    Unreachable {
        name: String,
        offset: usize,
        width: u8,
        frame_len: usize,
    },

    /// File extension not recognised
    #[error("unsupported channel file format: {0}")]
    UnsupportedFormat(String),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for channel table operations
pub type ChannelResult<T> = Result<T, ChannelError>;
