//! Simulated rotating-stream ECU
//!
//! Lays channel values out at their offsets, cuts the result into 8-byte
//! frames and closes each rotation with a marker frame. Used for bench runs
//! and as a frame generator in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use telem_channels::{ChannelDescriptor, ChannelTable, FRAME_PAYLOAD_LEN};

use super::{BusSource, TransportError};
use crate::config::SimulatedConfig;
use crate::decoder::{MARKER_POSITION, RESYNC_MARKER};
use crate::frame::CanFrame;

/// Payload of the frame that ends every rotation
pub fn marker_payload() -> [u8; FRAME_PAYLOAD_LEN] {
    let mut data = [0u8; FRAME_PAYLOAD_LEN];
    data[MARKER_POSITION..MARKER_POSITION + RESYNC_MARKER.len()].copy_from_slice(&RESYNC_MARKER);
    data
}

/// Encode one rotation: data frames carrying `raws` (table order), then the
/// marker frame.
///
/// Values are truncated to each channel's width. Missing raws encode as zero.
pub fn encode_rotation(source_id: u32, table: &ChannelTable, raws: &[i64]) -> Vec<CanFrame> {
    let frame_count = table.rotation_len().div_ceil(FRAME_PAYLOAD_LEN);
    let mut payload = vec![0u8; frame_count * FRAME_PAYLOAD_LEN];

    for (index, channel) in table.iter().enumerate() {
        let raw = raws.get(index).copied().unwrap_or(0);
        let bytes = raw.to_be_bytes();
        let width = channel.width as usize;
        payload[channel.offset..channel.end()].copy_from_slice(&bytes[8 - width..]);
    }

    payload
        .chunks(FRAME_PAYLOAD_LEN)
        .chain(std::iter::once(&marker_payload()[..]))
        .filter_map(|chunk| CanFrame::new(source_id, chunk))
        .collect()
}

/// Largest value the ramp produces for a channel
fn ramp_ceiling(channel: &ChannelDescriptor) -> i64 {
    let bits = 8 * channel.width as u32;
    let max = if channel.signed {
        (1i64 << (bits - 1).min(62)) - 1
    } else {
        (1i64 << bits.min(62)) - 1
    };
    max.min(9_999)
}

/// Sawtooth value for channel `index` in rotation `rotation`
fn ramp_value(channel: &ChannelDescriptor, index: usize, rotation: u64) -> i64 {
    let ceiling = ramp_ceiling(channel) as u64 + 1;
    let step = 7 * (index as u64 + 1);
    (rotation.wrapping_mul(step) % ceiling) as i64
}

/// Generates rotations of ramping values
pub struct SimulatedSource {
    source_id: u32,
    table: Arc<ChannelTable>,
    interval: Duration,
    rotation_limit: Option<u64>,
    rotation: u64,
    pending: VecDeque<CanFrame>,
}

impl SimulatedSource {
    pub fn new(source_id: u32, table: Arc<ChannelTable>, config: &SimulatedConfig) -> Self {
        Self {
            source_id,
            table,
            interval: Duration::from_millis(config.frame_interval_ms),
            rotation_limit: config.rotations,
            rotation: 0,
            pending: VecDeque::new(),
        }
    }

    /// Raw values encoded in the given rotation
    pub fn raws_for(&self, rotation: u64) -> Vec<i64> {
        self.table
            .iter()
            .enumerate()
            .map(|(index, channel)| ramp_value(channel, index, rotation))
            .collect()
    }
}

#[async_trait]
impl BusSource for SimulatedSource {
    async fn recv(&mut self) -> Result<Option<CanFrame>, TransportError> {
        if self.pending.is_empty() {
            if self.rotation_limit.is_some_and(|limit| self.rotation >= limit) {
                return Ok(None);
            }
            let raws = self.raws_for(self.rotation);
            self.pending
                .extend(encode_rotation(self.source_id, &self.table, &raws));
            self.rotation += 1;
        }

        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        Ok(self.pending.pop_front())
    }

    fn describe(&self) -> String {
        format!("simulated 0x{:03X}", self.source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FrameDecoder;
    use crate::store::SnapshotStore;

    #[test]
    fn test_encode_m400_rotation() {
        let table = telem_channels::profile::m400().unwrap();
        let frames = encode_rotation(0x5F0, &table, &[3000, 1234, 1013, 1380]);

        // 46 bytes of channels need six frames, plus the marker
        assert_eq!(frames.len(), 7);
        assert_eq!(frames[0].data(), &[0x0B, 0xB8, 0x04, 0xD2, 0x03, 0xF5, 0, 0]);
        assert_eq!(frames[5].data(), &[0, 0, 0, 0, 0x05, 0x64, 0, 0]);
        assert_eq!(frames[6].data(), &marker_payload());
        assert!(frames.iter().all(|f| f.id() == 0x5F0));
    }

    #[test]
    fn test_negative_values_truncate_to_width() {
        let table =
            ChannelTable::new(vec![ChannelDescriptor::new("Temp", 0, 2)]).unwrap();
        let frames = encode_rotation(0x5F0, &table, &[-10]);
        assert_eq!(&frames[0].data()[..2], &[0xFF, 0xF6]);
    }

    #[tokio::test]
    async fn test_simulated_rotations_decode() {
        let table = Arc::new(telem_channels::profile::m400().unwrap());
        let config = SimulatedConfig {
            frame_interval_ms: 0,
            rotations: Some(3),
        };
        let mut source = SimulatedSource::new(0x5F0, table.clone(), &config);
        let expected = source.raws_for(2);

        let store = Arc::new(SnapshotStore::new(table));
        let mut decoder = FrameDecoder::new(0x5F0, store.clone());

        let mut frames = 0;
        while let Some(frame) = source.recv().await.unwrap() {
            decoder.process(&frame);
            frames += 1;
        }

        assert_eq!(frames, 21);
        assert_eq!(decoder.stats().markers, 3);
        assert_eq!(store.drain_if_dirty().unwrap().raws(), expected.as_slice());
    }
}
