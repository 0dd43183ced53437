//! Snapshot sinks
//!
//! A sink persists the formatted document built from each drained snapshot.
//! The reference encoding is
//!
//! ```json
//! {"channels":[{"name":"RPM","value":"3000 RPM"},{"name":"BatteryVoltage","value":"13.80 V"}]}
//! ```

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Snapshot;

pub use file::{FileSink, SinkFormat};
pub use memory::MemorySink;

/// Sink failures
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Sink setup failed: {0}")]
    Setup(String),

    #[error("Sink task failed: {0}")]
    Task(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// One channel as written to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    /// Formatted value followed by the unit, e.g. `"123.4 %"`
    pub value: String,
}

/// Sink payload: every channel in table order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub channels: Vec<ChannelEntry>,
}

impl SnapshotDocument {
    /// Format every reading of a snapshot
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            channels: snapshot
                .readings()
                .map(|reading| ChannelEntry {
                    name: reading.name().to_string(),
                    value: reading.formatted(),
                })
                .collect(),
        }
    }

    /// Compact JSON encoding
    pub fn to_json(&self) -> Result<String, SinkError> {
        Ok(serde_json::to_string(self)?)
    }

    /// One `name: value` line per channel
    pub fn to_text(&self) -> String {
        self.channels
            .iter()
            .map(|entry| format!("{}: {}\n", entry.name, entry.value))
            .collect()
    }

    /// Value of a channel by name
    pub fn value(&self, name: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.as_str())
    }
}

impl From<&Snapshot> for SnapshotDocument {
    fn from(snapshot: &Snapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

/// Destination for published snapshots
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Replace the sink's content with `doc`
    async fn publish(&self, doc: &SnapshotDocument) -> Result<(), SinkError>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}
