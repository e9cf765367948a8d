use serde::{Deserialize, Serialize};

use crate::hex_transfer::{MAX_HEX_CHUNK_SIZE, PAD};

/// One 5-byte slice of a HEX line. Packed into 8 bytes, little endian:
///
/// | bits   | field              |
/// |--------|--------------------|
/// | 0      | msg_type, always 1 |
/// | 1..15  | line_num           |
/// | 16..19 | segment_num        |
/// | 20..23 | total_segments     |
/// | 24..63 | hex_data           |
///
/// The last segment of a line pads `hex_data` with 0xFF.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMessage {
    pub line_num: u16,
    pub segment_num: u8,
    pub total_segments: u8,
    pub hex_data: [u8; MAX_HEX_CHUNK_SIZE],
}

impl SegmentMessage {
    pub fn unpack(buf: &[u8; 8]) -> Self {
        let w = u64::from_le_bytes(*buf);
        let mut hex_data = [0u8; MAX_HEX_CHUNK_SIZE];
        hex_data.copy_from_slice(&buf[3..8]);
        Self {
            line_num: ((w >> 1) & 0x7FFF) as u16,
            segment_num: ((w >> 16) & 0x0F) as u8,
            total_segments: ((w >> 20) & 0x0F) as u8,
            hex_data,
        }
    }

    pub fn pack(&self) -> [u8; 8] {
        let mut w = 0x01u64;
        w |= ((self.line_num & 0x7FFF) as u64) << 1;
        w |= ((self.segment_num & 0x0F) as u64) << 16;
        w |= ((self.total_segments & 0x0F) as u64) << 20;
        let mut buf = w.to_le_bytes();
        buf[3..8].copy_from_slice(&self.hex_data);
        buf
    }

    /// Payload with PAD and non-printable bytes shown as dots, for trace
    /// output.
    pub fn printable_data(&self) -> [u8; MAX_HEX_CHUNK_SIZE] {
        let mut out = [b'.'; MAX_HEX_CHUNK_SIZE];
        for (out, &b) in out.iter_mut().zip(self.hex_data.iter()) {
            if b != PAD && b.is_ascii_graphic() {
                *out = b;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::init_logger;

    #[test]
    fn pack_unpack_round_trip() {
        init_logger();

        for msg in [
            SegmentMessage {
                line_num: 0,
                segment_num: 0,
                total_segments: 1,
                hex_data: [PAD; 5],
            },
            SegmentMessage {
                line_num: 0x7FFF,
                segment_num: 8,
                total_segments: 9,
                hex_data: *b"7EFE0",
            },
        ] {
            let buf = msg.pack();
            assert_eq!(buf[0] & 0x01, 1);
            assert_eq!(SegmentMessage::unpack(&buf), msg);
        }
    }

    #[test]
    fn field_placement() {
        init_logger();

        // line 5, segment 2 of 3, known payload
        let msg = SegmentMessage {
            line_num: 5,
            segment_num: 2,
            total_segments: 3,
            hex_data: *b"ABCDE",
        };
        let buf = msg.pack();
        assert_eq!(buf[0], (5 << 1) | 1);
        assert_eq!(buf[1], 0);
        assert_eq!(buf[2], 2 | (3 << 4));
        assert_eq!(&buf[3..8], b"ABCDE");
    }

    #[test]
    fn printable_data_masks_pad() {
        init_logger();

        let msg = SegmentMessage {
            line_num: 0,
            segment_num: 1,
            total_segments: 2,
            hex_data: [b'4', b'0', PAD, PAD, PAD],
        };
        assert_eq!(&msg.printable_data(), b"40...");
    }
}
