//! Channel descriptor
//!
//! Describes where one telemetry signal sits in the rotating payload stream
//! and how its raw reading is scaled and displayed.

use serde::{Deserialize, Serialize};

use crate::decode::read_be;
use crate::precision::{format_fixed, precision_from_scale};

/// Complete definition of a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Display name (e.g., "RPM", "BatteryVoltage")
    pub name: String,

    /// Byte position within one full rotation of the source id's payloads
    pub offset: usize,

    /// Bytes occupied (1..=8)
    #[serde(default = "default_width")]
    pub width: u8,

    /// Scale factor: physical = raw * scale
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Decimal places shown after scaling; derived from `scale` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,

    /// Unit string (e.g., "kPa", "V")
    #[serde(default)]
    pub unit: String,

    /// Two's-complement reading (sign-extended) or plain unsigned
    #[serde(default = "default_signed")]
    pub signed: bool,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_width() -> u8 {
    2
}

fn default_scale() -> f64 {
    1.0
}

fn default_signed() -> bool {
    true
}

impl ChannelDescriptor {
    /// Create a signed, unscaled channel
    pub fn new(name: impl Into<String>, offset: usize, width: u8) -> Self {
        Self {
            name: name.into(),
            offset,
            width,
            scale: default_scale(),
            precision: None,
            unit: String::new(),
            signed: default_signed(),
            description: None,
        }
    }

    /// Set the scale factor
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set an explicit precision
    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Mark the reading as unsigned
    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    /// Effective number of decimal places
    pub fn precision(&self) -> u8 {
        self.precision
            .unwrap_or_else(|| precision_from_scale(self.scale))
    }

    /// First byte offset past this channel
    pub fn end(&self) -> usize {
        self.offset + self.width as usize
    }

    /// Decode this channel from payload bytes starting at its first byte.
    ///
    /// Returns `None` when fewer than `width` bytes are available.
    pub fn decode(&self, bytes: &[u8]) -> Option<i64> {
        bytes
            .get(..self.width as usize)
            .map(|value| read_be(value, self.signed))
    }

    /// Physical value for a raw reading
    pub fn scaled(&self, raw: i64) -> f64 {
        raw as f64 * self.scale
    }

    /// Scaled value formatted to this channel's precision, without unit
    pub fn format_value(&self, raw: i64) -> String {
        format_fixed(self.scaled(raw), self.precision())
    }

    /// Scaled value with unit, e.g. `"12.34 V"`
    pub fn format_reading(&self, raw: i64) -> String {
        let value = self.format_value(raw);
        if self.unit.is_empty() {
            value
        } else {
            format!("{} {}", value, self.unit)
        }
    }
}
