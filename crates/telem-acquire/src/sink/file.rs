//! File sink with atomic replacement
//!
//! Each publish writes a temporary file next to the destination and renames
//! it over the destination, so a concurrent reader sees either the previous
//! document or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{SinkError, SnapshotDocument, SnapshotSink};

/// On-disk encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// `{"channels":[{"name":..,"value":..}]}`
    #[default]
    Json,
    /// `name: value` lines
    Text,
}

impl SinkFormat {
    fn encode(self, doc: &SnapshotDocument) -> Result<String, SinkError> {
        match self {
            Self::Json => doc.to_json(),
            Self::Text => Ok(doc.to_text()),
        }
    }
}

/// Writes each document to a fixed path
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    dir: PathBuf,
    format: SinkFormat,
}

impl FileSink {
    /// Create a sink for `path`.
    ///
    /// Fails if the parent directory is missing or not writable.
    pub fn new(path: impl Into<PathBuf>, format: SinkFormat) -> Result<Self, SinkError> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(SinkError::Setup(format!(
                "Output path has no file name: {}",
                path.display()
            )));
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if !dir.is_dir() {
            return Err(SinkError::Setup(format!(
                "Output directory does not exist: {}",
                dir.display()
            )));
        }

        // Probe writability with a throwaway file in the same directory
        NamedTempFile::new_in(&dir).map_err(|e| {
            SinkError::Setup(format!(
                "Output directory is not writable: {}: {}",
                dir.display(),
                e
            ))
        })?;

        info!(path = %path.display(), format = ?format, "File sink ready");
        Ok(Self { path, dir, format })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SinkFormat {
        self.format
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn write_atomic(&self, contents: &[u8]) -> Result<(), SinkError> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(contents).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;

        // Temp files are created 0600; readers run as other users
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))
                .map_err(|e| self.io_error(e))?;
        }

        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotSink for FileSink {
    async fn publish(&self, doc: &SnapshotDocument) -> Result<(), SinkError> {
        let contents = self.format.encode(doc)?;
        let sink = self.clone();

        tokio::task::spawn_blocking(move || sink.write_atomic(contents.as_bytes()))
            .await
            .map_err(|e| SinkError::Task(format!("File write task join error: {}", e)))??;

        debug!(path = %self.path.display(), channels = doc.channels.len(), "Snapshot written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {} ({:?})", self.path.display(), self.format)
    }
}
