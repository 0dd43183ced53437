//! Acquisition errors

use thiserror::Error;

use crate::sink::SinkError;

/// Invalid acquisition configuration, rejected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid CAN ID '{value}': {reason}")]
    InvalidCanId { value: String, reason: String },

    #[error("Invalid publish period: {0} ms")]
    InvalidPeriod(u64),
}

/// Publisher loop failures
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Sink failed after {published} snapshots: {source}")]
    Sink {
        published: u64,
        #[source]
        source: SinkError,
    },
}

impl PublisherError {
    /// Snapshots published before the failure
    pub fn published(&self) -> u64 {
        match self {
            Self::Sink { published, .. } => *published,
        }
    }
}

/// Runtime failures
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{task} task failed: {reason}")]
    Join { task: &'static str, reason: String },
}
