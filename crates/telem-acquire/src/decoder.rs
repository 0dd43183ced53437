//! Frame decoder for rotating-payload ECU streams
//!
//! The ECU spreads its channel set over many consecutive frames sharing one
//! CAN id. The decoder keeps a cursor that counts payload bytes across frame
//! boundaries and matches that count against channel offsets. A fixed marker
//! at bytes 4..=6 of a frame ends each rotation and resets the cursor.
//!
//! A dropped frame shifts every following offset until the next marker. The
//! wire format has no sequence number or checksum, so this is not detected;
//! the marker is the only recovery point.

use std::sync::Arc;

use telem_channels::ChannelTable;
use tracing::{debug, trace};

use crate::frame::{CanFrame, MAX_STANDARD_ID};
use crate::store::SnapshotStore;

/// End-of-rotation marker bytes
pub const RESYNC_MARKER: [u8; 3] = [0xFC, 0xFB, 0xFA];

/// Payload index of the first marker byte
pub const MARKER_POSITION: usize = 4;

/// True when the frame carries the end-of-rotation marker
pub fn is_resync_marker(data: &[u8]) -> bool {
    data.get(MARKER_POSITION..MARKER_POSITION + RESYNC_MARKER.len()) == Some(&RESYNC_MARKER[..])
}

/// Position of the decoder within the rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderCursor {
    /// Next channel expected
    pub channel_index: usize,
    /// Payload bytes seen since the last marker; `None` before the first
    /// marker when waiting for sync
    pub byte_offset: Option<usize>,
}

impl DecoderCursor {
    /// Start of a rotation
    pub const fn start() -> Self {
        Self {
            channel_index: 0,
            byte_offset: Some(0),
        }
    }

    /// Waiting for the first marker
    pub const fn unsynced() -> Self {
        Self {
            channel_index: 0,
            byte_offset: None,
        }
    }

    /// Whether the cursor is counting bytes
    pub fn is_synced(&self) -> bool {
        self.byte_offset.is_some()
    }
}

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame id or id format did not match the source
    Ignored,
    /// Frame consumed
    Decoded {
        /// Channels recorded from this frame
        channels: usize,
        /// Frame carried the marker; cursor is back at the rotation start
        resynced: bool,
    },
}

/// Running counters, reported when the decoder stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames with the source id
    pub frames: u64,
    /// Frames with another id or id format
    pub ignored: u64,
    /// Markers observed
    pub markers: u64,
    /// Channel values recorded
    pub channels: u64,
    /// Channel slots reached with too few bytes left in the frame
    pub truncated: u64,
}

/// Rotating-stream decoder for one source id
#[derive(Debug)]
pub struct FrameDecoder {
    source_id: u32,
    source_extended: bool,
    table: Arc<ChannelTable>,
    store: Arc<SnapshotStore>,
    cursor: DecoderCursor,
    stats: DecoderStats,
    batch: Vec<(usize, i64)>,
}

impl FrameDecoder {
    /// Create a decoder that writes into `store`.
    ///
    /// The stream start is treated as a rotation start. Ids that fit in 11
    /// bits match standard frames only; use [`extended_id`](Self::extended_id)
    /// for a 29-bit source with a small id.
    pub fn new(source_id: u32, store: Arc<SnapshotStore>) -> Self {
        let table = store.table().clone();
        Self {
            source_id,
            source_extended: source_id > MAX_STANDARD_ID,
            batch: Vec::with_capacity(table.len()),
            table,
            store,
            cursor: DecoderCursor::start(),
            stats: DecoderStats::default(),
        }
    }

    /// Ignore payload bytes until the first marker has been seen
    pub fn wait_for_sync(mut self, wait: bool) -> Self {
        self.cursor = if wait {
            DecoderCursor::unsynced()
        } else {
            DecoderCursor::start()
        };
        self
    }

    /// Match extended (29-bit) frames instead of standard ones
    pub fn extended_id(mut self, extended: bool) -> Self {
        self.source_extended = extended || self.source_id > MAX_STANDARD_ID;
        self
    }

    /// Configured source id
    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    /// Current cursor
    pub fn cursor(&self) -> DecoderCursor {
        self.cursor
    }

    /// Counters so far
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Consume one frame
    pub fn process(&mut self, frame: &CanFrame) -> FrameOutcome {
        if frame.id() != self.source_id || frame.is_extended() != self.source_extended {
            self.stats.ignored += 1;
            return FrameOutcome::Ignored;
        }

        self.stats.frames += 1;
        let data = frame.data();
        trace!(frame = %frame, cursor = ?self.cursor, "Processing frame");

        self.batch.clear();
        if let Some(mut offset) = self.cursor.byte_offset {
            let channels = self.table.channels();

            for i in 0..data.len() {
                let channel = &channels[self.cursor.channel_index];
                if offset == channel.offset {
                    match channel.decode(&data[i..]) {
                        Some(raw) => self.batch.push((self.cursor.channel_index, raw)),
                        None => {
                            self.stats.truncated += 1;
                            debug!(
                                channel = %channel.name,
                                offset,
                                available = data.len() - i,
                                width = channel.width,
                                "Channel bytes cut short by end of frame"
                            );
                        }
                    }
                    self.cursor.channel_index = (self.cursor.channel_index + 1) % channels.len();
                }
                offset += 1;
            }

            self.cursor.byte_offset = Some(offset);
        }

        let resynced = is_resync_marker(data);
        if resynced {
            if !self.cursor.is_synced() {
                debug!("First rotation marker seen, decoder synchronized");
            }
            trace!(bytes_seen = ?self.cursor.byte_offset, "Rotation marker");
            self.cursor = DecoderCursor::start();
            self.stats.markers += 1;
        }

        let recorded = self.batch.len();
        if recorded > 0 {
            self.store.record_batch(&self.batch);
            self.stats.channels += recorded as u64;
        }

        FrameOutcome::Decoded {
            channels: recorded,
            resynced,
        }
    }
}
