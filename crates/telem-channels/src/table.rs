//! Channel table - the validated, ordered set of channel descriptors
//!
//! A table is immutable once built. Every structural problem (overlap,
//! unreachable offsets, bad widths) is rejected here so the decoder never has
//! to check at runtime.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decode::MAX_WIDTH;
use crate::descriptor::ChannelDescriptor;
use crate::error::{ChannelError, ChannelResult};
use crate::precision::MAX_PRECISION;

/// Payload length of a classic CAN frame.
///
/// Rotation offsets count payload bytes, and a channel's bytes must sit in a
/// single frame, so no channel may cross a multiple of this value.
pub const FRAME_PAYLOAD_LEN: usize = 8;

/// Metadata about a channel table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Name of the ECU profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Version string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// On-disk layout of a channel definition file
#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    meta: Option<TableMeta>,
    #[serde(default)]
    channels: Vec<ChannelDescriptor>,
}

/// Ordered, validated list of channel descriptors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelTable {
    meta: TableMeta,
    channels: Vec<ChannelDescriptor>,
}

impl ChannelTable {
    /// Build a table, validating the channel layout
    pub fn new(channels: Vec<ChannelDescriptor>) -> ChannelResult<Self> {
        Self::with_meta(TableMeta::default(), channels)
    }

    /// Build a table with metadata
    pub fn with_meta(meta: TableMeta, channels: Vec<ChannelDescriptor>) -> ChannelResult<Self> {
        validate(&channels)?;
        Ok(Self { meta, channels })
    }

    /// Load a table from a definition file (`.yaml`, `.yml` or `.toml`)
    pub fn from_file(path: impl AsRef<Path>) -> ChannelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "yaml" | "yml" => Self::from_yaml(&content),
            "toml" => Self::from_toml(&content),
            other => Err(ChannelError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Load a table from a YAML string
    pub fn from_yaml(yaml: &str) -> ChannelResult<Self> {
        let file: DefinitionFile = serde_yaml::from_str(yaml)?;
        Self::with_meta(file.meta.unwrap_or_default(), file.channels)
    }

    /// Load a table from a TOML string
    pub fn from_toml(content: &str) -> ChannelResult<Self> {
        let file: DefinitionFile = toml::from_str(content)?;
        Self::with_meta(file.meta.unwrap_or_default(), file.channels)
    }

    /// Table metadata
    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    /// All channels in offset order
    pub fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    /// Index of the channel named `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false for a validated table; provided for API symmetry
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterate over channels in offset order
    pub fn iter(&self) -> std::slice::Iter<'_, ChannelDescriptor> {
        self.channels.iter()
    }

    /// Number of payload bytes one full rotation spans (end of the last channel)
    pub fn rotation_len(&self) -> usize {
        self.channels.last().map(ChannelDescriptor::end).unwrap_or(0)
    }
}

impl<'a> IntoIterator for &'a ChannelTable {
    type Item = &'a ChannelDescriptor;
    type IntoIter = std::slice::Iter<'a, ChannelDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

fn validate(channels: &[ChannelDescriptor]) -> ChannelResult<()> {
    if channels.is_empty() {
        return Err(ChannelError::EmptyTable);
    }

    let mut names = HashSet::with_capacity(channels.len());

    for (index, ch) in channels.iter().enumerate() {
        if ch.name.trim().is_empty() {
            return Err(ChannelError::EmptyName { index });
        }
        if !names.insert(ch.name.as_str()) {
            return Err(ChannelError::DuplicateName(ch.name.clone()));
        }
        if ch.width == 0 || ch.width as usize > MAX_WIDTH {
            return Err(ChannelError::InvalidWidth {
                name: ch.name.clone(),
                width: ch.width,
            });
        }
        if !ch.scale.is_finite() {
            return Err(ChannelError::InvalidScale {
                name: ch.name.clone(),
                scale: ch.scale,
            });
        }
        if ch.precision() > MAX_PRECISION {
            return Err(ChannelError::InvalidPrecision {
                name: ch.name.clone(),
                precision: ch.precision(),
                max: MAX_PRECISION,
            });
        }
        if ch.offset % FRAME_PAYLOAD_LEN + ch.width as usize > FRAME_PAYLOAD_LEN {
            return Err(ChannelError::Unreachable {
                name: ch.name.clone(),
                offset: ch.offset,
                width: ch.width,
                frame_len: FRAME_PAYLOAD_LEN,
            });
        }

        if let Some(prev) = index.checked_sub(1).map(|i| &channels[i]) {
            if ch.offset <= prev.offset {
                return Err(ChannelError::Unordered {
                    name: ch.name.clone(),
                    offset: ch.offset,
                    previous: prev.name.clone(),
                    previous_offset: prev.offset,
                });
            }
            if ch.offset < prev.end() {
                return Err(ChannelError::Overlap {
                    name: ch.name.clone(),
                    offset: ch.offset,
                    previous: prev.name.clone(),
                    previous_end: prev.end(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ch(name: &str, offset: usize, width: u8) -> ChannelDescriptor {
        ChannelDescriptor::new(name, offset, width)
    }

    #[test]
    fn test_valid_table() {
        let table = ChannelTable::new(vec![ch("A", 0, 2), ch("B", 2, 2), ch("C", 44, 2)]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of("C"), Some(2));
        assert_eq!(table.rotation_len(), 46);
        assert_eq!(
            table.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(matches!(
            ChannelTable::new(Vec::new()),
            Err(ChannelError::EmptyTable)
        ));
    }

    #[test]
    fn test_rejects_overlap() {
        let err = ChannelTable::new(vec![ch("A", 0, 4), ch("B", 2, 2)]).unwrap_err();
        assert!(matches!(err, ChannelError::Overlap { previous_end: 4, .. }));
    }

    #[test]
    fn test_rejects_unordered_and_duplicate_offsets() {
        let err = ChannelTable::new(vec![ch("A", 4, 2), ch("B", 0, 2)]).unwrap_err();
        assert!(matches!(err, ChannelError::Unordered { .. }));

        let err = ChannelTable::new(vec![ch("A", 0, 1), ch("B", 0, 1)]).unwrap_err();
        assert!(matches!(err, ChannelError::Unordered { .. }));
    }

    #[test]
    fn test_rejects_frame_straddle() {
        let err = ChannelTable::new(vec![ch("A", 7, 2)]).unwrap_err();
        assert!(matches!(err, ChannelError::Unreachable { offset: 7, .. }));

        // Ending exactly on the boundary is fine
        assert!(ChannelTable::new(vec![ch("A", 6, 2), ch("B", 8, 8)]).is_ok());
    }

    #[test]
    fn test_rejects_bad_width() {
        assert!(matches!(
            ChannelTable::new(vec![ch("A", 0, 0)]),
            Err(ChannelError::InvalidWidth { width: 0, .. })
        ));
        assert!(matches!(
            ChannelTable::new(vec![ch("A", 0, 9)]),
            Err(ChannelError::InvalidWidth { width: 9, .. })
        ));
    }

    #[test]
    fn test_rejects_names_and_scale() {
        assert!(matches!(
            ChannelTable::new(vec![ch("A", 0, 1), ch("A", 1, 1)]),
            Err(ChannelError::DuplicateName(_))
        ));
        assert!(matches!(
            ChannelTable::new(vec![ch(" ", 0, 1)]),
            Err(ChannelError::EmptyName { index: 0 })
        ));
        assert!(matches!(
            ChannelTable::new(vec![ch("A", 0, 1).with_scale(f64::NAN)]),
            Err(ChannelError::InvalidScale { .. })
        ));
        assert!(matches!(
            ChannelTable::new(vec![ch("A", 0, 1).with_precision(12)]),
            Err(ChannelError::InvalidPrecision { precision: 12, .. })
        ));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
meta:
  name: Test ECU
  version: "1.0"

channels:
  - name: RPM
    offset: 0
    width: 2
    unit: RPM
    signed: false
  - name: ThrottlePosition
    offset: 2
    scale: 0.1
    unit: "%"
"#;
        let table = ChannelTable::from_yaml(yaml).unwrap();
        assert_eq!(table.meta().name.as_deref(), Some("Test ECU"));
        assert_eq!(table.len(), 2);
        assert!(!table.channels()[0].signed);
        assert_eq!(table.channels()[1].precision(), 1);
        assert_eq!(table.channels()[1].format_reading(1234), "123.4 %");
    }

    #[test]
    fn test_from_toml() {
        let content = r#"
[meta]
name = "Inline"

[[channels]]
name = "Voltage"
offset = 44
scale = 0.01
precision = 2
unit = "V"
"#;
        let table = ChannelTable::from_toml(content).unwrap();
        assert_eq!(table.channels()[0].offset, 44);
        assert_eq!(table.channels()[0].format_reading(1250), "12.50 V");
    }

    #[test]
    fn test_from_yaml_validates() {
        let yaml = "channels:\n  - name: A\n    offset: 0\n    width: 4\n  - name: B\n    offset: 3\n";
        assert!(matches!(
            ChannelTable::from_yaml(yaml),
            Err(ChannelError::Overlap { .. })
        ));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("ecu.channels.yaml");
        std::fs::write(&yaml_path, "channels:\n  - name: A\n    offset: 0\n").unwrap();
        assert_eq!(ChannelTable::from_file(&yaml_path).unwrap().len(), 1);

        let json_path = dir.path().join("ecu.json");
        std::fs::write(&json_path, "{}").unwrap();
        assert!(matches!(
            ChannelTable::from_file(&json_path),
            Err(ChannelError::UnsupportedFormat(ext)) if ext == "json"
        ));

        assert!(matches!(
            ChannelTable::from_file(dir.path().join("missing.yaml")),
            Err(ChannelError::IoError(_))
        ));
    }
}
