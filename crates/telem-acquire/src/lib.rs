//! telem-acquire - CAN acquisition for rotating ECU telemetry streams
//!
//! Reads frames from a bus source, reconstructs channel values from the
//! rotating payload of a single CAN id and republishes them as periodic
//! snapshots.
//!
//! ```text
//! BusSource ──▶ FrameDecoder ──▶ SnapshotStore ──▶ Publisher ──▶ SnapshotSink
//!  (frames)     (cursor/resync)   (dirty flag)      (interval)    (file/memory)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use telem_acquire::{CanFrame, FrameDecoder, SnapshotDocument, SnapshotStore};
//! use telem_channels::{ChannelDescriptor, ChannelTable};
//!
//! let table = ChannelTable::new(vec![
//!     ChannelDescriptor::new("RPM", 0, 2).with_unit("RPM").unsigned(),
//!     ChannelDescriptor::new("ThrottlePosition", 2, 2).with_scale(0.1).with_unit("%"),
//! ])
//! .unwrap();
//!
//! let store = Arc::new(SnapshotStore::new(Arc::new(table)));
//! let mut decoder = FrameDecoder::new(0x5F0, store.clone());
//!
//! let frame = CanFrame::new(0x5F0, &[0x0B, 0xB8, 0x04, 0xD2, 0xFC, 0xFB, 0xFA, 0x00]).unwrap();
//! decoder.process(&frame);
//!
//! let snapshot = store.drain_if_dirty().unwrap();
//! let doc = SnapshotDocument::from(&snapshot);
//! assert_eq!(doc.value("RPM"), Some("3000 RPM"));
//! assert_eq!(doc.value("ThrottlePosition"), Some("123.4 %"));
//! assert!(store.drain_if_dirty().is_none());
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod publisher;
pub mod runtime;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod store;

pub use config::{
    parse_can_id, DecoderConfig, PublisherConfig, ReplayConfig, SimulatedConfig, SocketCanConfig,
    SourceConfig,
};
pub use decoder::{DecoderCursor, DecoderStats, FrameDecoder, FrameOutcome, RESYNC_MARKER};
pub use error::{ConfigError, PublisherError, RuntimeError};
pub use frame::CanFrame;
pub use publisher::{Publisher, PublisherReport};
pub use runtime::{Acquisition, AcquisitionSettings, RunReport};
pub use shutdown::Shutdown;
pub use sink::{
    ChannelEntry, FileSink, MemorySink, SinkError, SinkFormat, SnapshotDocument, SnapshotSink,
};
pub use source::{create_source, BusSource, MockSource, MockSourceHandle, TransportError};
pub use store::{ChannelReading, Snapshot, SnapshotStore};
