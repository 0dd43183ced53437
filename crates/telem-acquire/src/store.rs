//! Snapshot store - the single handoff point between decoder and publisher
//!
//! The decoder records raw readings as they arrive; the publisher drains a
//! complete copy only when something changed. A `parking_lot::Mutex` guards
//! the raw values and the dirty flag together, and is held only long enough
//! to copy integers, so neither side ever waits on the other's I/O.
//!
//! Until every channel has been decoded at least once the store withholds
//! snapshots, so a consumer never sees the zero placeholder of a channel that
//! has not arrived yet. [`SnapshotStore::allow_partial`] lifts that gate.

use std::sync::Arc;

use parking_lot::Mutex;
use telem_channels::{ChannelDescriptor, ChannelTable};

/// Latest raw values plus the dirty flag
#[derive(Debug)]
struct StoreState {
    raws: Vec<i64>,
    seen: Vec<bool>,
    /// Channels never recorded
    missing: usize,
    dirty: bool,
    sequence: u64,
}

impl StoreState {
    fn ready(&self, require_complete: bool) -> bool {
        self.dirty && (!require_complete || self.missing == 0)
    }
}

/// Holds the latest raw value of every channel.
///
/// Single writer (the frame decoder), single reader (the publisher).
#[derive(Debug)]
pub struct SnapshotStore {
    table: Arc<ChannelTable>,
    require_complete: bool,
    state: Mutex<StoreState>,
}

impl SnapshotStore {
    /// Create a store with every channel at zero and no pending changes.
    ///
    /// Nothing drains until each channel has been recorded once.
    pub fn new(table: Arc<ChannelTable>) -> Self {
        let len = table.len();
        Self {
            table,
            require_complete: true,
            state: Mutex::new(StoreState {
                raws: vec![0; len],
                seen: vec![false; len],
                missing: len,
                dirty: false,
                sequence: 0,
            }),
        }
    }

    /// Drain as soon as anything changed, even while some channels still
    /// hold their initial zero
    pub fn allow_partial(mut self) -> Self {
        self.require_complete = false;
        self
    }

    /// Channel table the store was built for
    pub fn table(&self) -> &Arc<ChannelTable> {
        &self.table
    }

    /// Record one channel's raw value and mark the store dirty
    pub fn record(&self, channel_index: usize, raw: i64) {
        self.record_batch(&[(channel_index, raw)]);
    }

    /// Record several values under one lock acquisition.
    ///
    /// An empty batch leaves the dirty flag untouched. Out-of-range indexes
    /// are skipped.
    pub fn record_batch(&self, updates: &[(usize, i64)]) {
        if updates.is_empty() {
            return;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut changed = false;

        for &(index, raw) in updates {
            match (state.raws.get_mut(index), state.seen.get_mut(index)) {
                (Some(slot), Some(seen)) => {
                    *slot = raw;
                    changed = true;
                    if !std::mem::replace(seen, true) {
                        state.missing -= 1;
                    }
                }
                _ => {
                    tracing::warn!(index, "Ignoring value for unknown channel index");
                }
            }
        }

        if changed {
            state.dirty = true;
        }
    }

    /// Take a snapshot if anything was recorded since the last drain.
    ///
    /// Clears the dirty flag; a second call without new data returns `None`.
    /// While a channel has never been recorded the store stays dirty and
    /// returns `None`, unless built with [`allow_partial`](Self::allow_partial).
    pub fn drain_if_dirty(&self) -> Option<Snapshot> {
        let mut state = self.state.lock();
        if !state.ready(self.require_complete) {
            return None;
        }

        state.dirty = false;
        state.sequence += 1;

        Some(Snapshot {
            table: self.table.clone(),
            raws: state.raws.clone(),
            sequence: state.sequence,
        })
    }

    /// Whether a drain would return a snapshot
    pub fn is_dirty(&self) -> bool {
        self.state.lock().ready(self.require_complete)
    }

    /// Whether every channel has been recorded at least once
    pub fn is_complete(&self) -> bool {
        self.state.lock().missing == 0
    }

    /// Current raw value of one channel, without touching the dirty flag
    pub fn raw(&self, channel_index: usize) -> Option<i64> {
        self.state.lock().raws.get(channel_index).copied()
    }
}

/// Complete copy of all channel values at one instant
#[derive(Debug, Clone)]
pub struct Snapshot {
    table: Arc<ChannelTable>,
    raws: Vec<i64>,
    sequence: u64,
}

impl Snapshot {
    /// Drain counter; starts at 1 and increases by one per drained snapshot
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.raws.len()
    }

    /// True when the table has no channels
    pub fn is_empty(&self) -> bool {
        self.raws.is_empty()
    }

    /// Raw values in table order
    pub fn raws(&self) -> &[i64] {
        &self.raws
    }

    /// Raw value by channel name
    pub fn raw_by_name(&self, name: &str) -> Option<i64> {
        self.table
            .index_of(name)
            .and_then(|i| self.raws.get(i).copied())
    }

    /// Readings in table order
    pub fn readings(&self) -> impl Iterator<Item = ChannelReading<'_>> {
        self.table
            .iter()
            .zip(self.raws.iter())
            .map(|(descriptor, &raw)| ChannelReading { descriptor, raw })
    }
}

/// One channel's value inside a snapshot
#[derive(Debug, Clone, Copy)]
pub struct ChannelReading<'a> {
    pub descriptor: &'a ChannelDescriptor,
    pub raw: i64,
}

impl ChannelReading<'_> {
    /// Channel name
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Physical value (`raw * scale`)
    pub fn scaled(&self) -> f64 {
        self.descriptor.scaled(self.raw)
    }

    /// Value formatted to the channel's precision, followed by its unit
    pub fn formatted(&self) -> String {
        self.descriptor.format_reading(self.raw)
    }
}
