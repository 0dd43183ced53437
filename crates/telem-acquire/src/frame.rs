//! Raw CAN frame as delivered by a bus source

use std::fmt;

/// Largest 29-bit extended identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Largest 11-bit standard identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// A classic CAN data frame: identifier, id format and up to 8 payload
/// bytes.
///
/// Stored inline (no heap allocation) since payloads are at most 8 bytes.
/// The format is part of the frame identity: standard 0x5F0 and extended
/// 0x000005F0 are different frames on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    data: [u8; 8],
    len: u8,
}

impl CanFrame {
    /// Maximum payload length
    pub const MAX_DATA_LEN: usize = 8;

    /// Create a frame, standard when the id fits in 11 bits and extended
    /// otherwise; `None` if the payload exceeds 8 bytes or the id does not
    /// fit in 29 bits
    pub fn new(id: u32, data: &[u8]) -> Option<Self> {
        Self::with_format(id, id > MAX_STANDARD_ID, data)
    }

    /// Create a frame with an explicit id format.
    ///
    /// `None` if the id does not fit the format or the payload exceeds 8
    /// bytes.
    pub fn with_format(id: u32, extended: bool, data: &[u8]) -> Option<Self> {
        let max_id = if extended {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        if data.len() > Self::MAX_DATA_LEN || id > max_id {
            return None;
        }

        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);

        Some(Self {
            id,
            extended,
            data: buf,
            len: data.len() as u8,
        })
    }

    /// CAN identifier (11 or 29 bit, no flag bits)
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Payload length (DLC)
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True for a zero-length payload
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True for a 29-bit (extended format) identifier
    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

/// candump compact notation, e.g. `5F0#0064000AFCFBFA00`
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "{:08X}#{}", self.id, hex::encode_upper(self.data()))
        } else {
            write!(f, "{:03X}#{}", self.id, hex::encode_upper(self.data()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let frame = CanFrame::new(0x5F0, &[0x00, 0x64, 0x00]).unwrap();
        assert_eq!(frame.id(), 0x5F0);
        assert_eq!(frame.data(), &[0x00, 0x64, 0x00]);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_extended());
        assert!(CanFrame::new(0x5F0, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_oversized() {
        assert!(CanFrame::new(0x5F0, &[0; 9]).is_none());
        assert!(CanFrame::new(0x2000_0000, &[0; 8]).is_none());
        assert!(CanFrame::with_format(0x800, false, &[]).is_none());
    }

    #[test]
    fn test_id_format_is_part_of_identity() {
        assert!(CanFrame::new(0x18DAF100, &[]).unwrap().is_extended());

        let standard = CanFrame::new(0x5F0, &[0x01]).unwrap();
        let extended = CanFrame::with_format(0x5F0, true, &[0x01]).unwrap();
        assert_eq!(standard.id(), extended.id());
        assert!(extended.is_extended());
        assert_ne!(standard, extended);
        assert_eq!(extended.to_string(), "000005F0#01");
    }

    #[test]
    fn test_display_candump_notation() {
        let frame = CanFrame::new(0x5F0, &[0x00, 0x64, 0xFC]).unwrap();
        assert_eq!(frame.to_string(), "5F0#0064FC");

        let ext = CanFrame::new(0x18DAF100, &[0x02, 0x7E]).unwrap();
        assert_eq!(ext.to_string(), "18DAF100#027E");
    }
}
