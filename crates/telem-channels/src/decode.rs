//! Decoding raw payload bytes to integer readings
//!
//! Channel values travel big-endian. A reading of `width` bytes is placed in
//! the most significant bytes of a 64-bit word and shifted back down, which
//! sign-extends signed channels for free.

/// Widest value a single channel can occupy
pub const MAX_WIDTH: usize = 8;

/// Read a big-endian integer of 1..=8 bytes.
///
/// Signed readings are sign-extended with an arithmetic shift; unsigned
/// readings are zero-extended. An unsigned 8-byte reading above `i64::MAX`
/// wraps, as the raw value is kept as `i64`.
///
/// Returns 0 for an empty slice; only the first 8 bytes are used.
pub fn read_be(bytes: &[u8], signed: bool) -> i64 {
    let width = bytes.len().min(MAX_WIDTH);
    if width == 0 {
        return 0;
    }

    let mut word = [0u8; MAX_WIDTH];
    word[..width].copy_from_slice(&bytes[..width]);
    let shift = 64 - 8 * width as u32;

    if signed {
        i64::from_be_bytes(word) >> shift
    } else {
        (u64::from_be_bytes(word) >> shift) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extension_two_bytes() {
        assert_eq!(read_be(&[0xFF, 0xF6], true), -10);
        assert_eq!(read_be(&[0xFF, 0xF6], false), 0xFFF6);
    }

    #[test]
    fn test_positive_values() {
        assert_eq!(read_be(&[0x00, 0x64], true), 100);
        assert_eq!(read_be(&[0x00, 0x0A], true), 10);
        assert_eq!(read_be(&[0x7F, 0xFF], true), i16::MAX as i64);
    }

    #[test]
    fn test_odd_widths() {
        assert_eq!(read_be(&[0x80], true), -128);
        assert_eq!(read_be(&[0x80], false), 128);
        assert_eq!(read_be(&[0xFF, 0xFF, 0xFE], true), -2);
        assert_eq!(read_be(&[0x01, 0x02, 0x03], false), 0x010203);
    }

    #[test]
    fn test_full_width() {
        let bytes = (-5i64).to_be_bytes();
        assert_eq!(read_be(&bytes, true), -5);
        assert_eq!(read_be(&bytes, false), -5);
        assert_eq!(read_be(&[0, 0, 0, 0, 0, 0, 0x01, 0x00], true), 256);
    }

    #[test]
    fn test_empty_and_oversized() {
        assert_eq!(read_be(&[], true), 0);
        // Bytes past the eighth are ignored
        assert_eq!(read_be(&[0, 0, 0, 0, 0, 0, 0, 1, 0xAA], false), 1);
    }
}
