//! telemd configuration
//!
//! One TOML file describes the bus source, the decoder, the publisher and
//! the channel table. Every section is optional; an empty file runs the
//! built-in M400 profile on `can0`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use telem_acquire::{DecoderConfig, PublisherConfig, SourceConfig};
use telem_channels::{profile, ChannelDescriptor, ChannelTable};

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bus source
    #[serde(default)]
    pub source: SourceConfig,

    /// Frame decoder
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Snapshot publisher
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Channel definition file (YAML or TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels_file: Option<PathBuf>,

    /// Inline channel definitions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelDescriptor>,
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    ///
    /// Relative paths inside the file are resolved against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        if let Some(file) = self.channels_file.as_mut() {
            resolve(file);
        }
        if let SourceConfig::Replay(replay) = &mut self.source {
            resolve(&mut replay.path);
        }
    }

    /// Build the channel table: definition file, inline list, or the
    /// built-in M400 profile when neither is given.
    pub fn channel_table(&self) -> Result<ChannelTable> {
        match (&self.channels_file, self.channels.is_empty()) {
            (Some(_), false) => bail!("Set either channels_file or inline [[channels]], not both"),
            (Some(file), true) => ChannelTable::from_file(file)
                .with_context(|| format!("Failed to load channels from {}", file.display())),
            (None, false) => {
                ChannelTable::new(self.channels.clone()).context("Invalid inline channel table")
            }
            (None, true) => Ok(profile::m400()?),
        }
    }
}
