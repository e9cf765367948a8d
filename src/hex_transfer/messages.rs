use init::InitMessage;
use segment::SegmentMessage;

pub mod init;
pub mod response;
pub mod segment;

/// One decoded inbound frame. Bit 0 of byte 0 discriminates the two
/// variants; every 8-byte frame decodes to one of them.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferMessage {
    Init(InitMessage),
    Segment(SegmentMessage),
}

impl TransferMessage {
    pub fn unpack(buf: &[u8; 8]) -> Self {
        if buf[0] & 0x01 == 0 {
            TransferMessage::Init(InitMessage::unpack(buf))
        } else {
            TransferMessage::Segment(SegmentMessage::unpack(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::init_logger;

    #[test]
    fn discriminates_on_bit_zero() {
        init_logger();

        let init = InitMessage::new(12, 0xDEAD_BEEF).pack();
        assert!(matches!(
            TransferMessage::unpack(&init),
            TransferMessage::Init(_)
        ));

        let segment = SegmentMessage {
            line_num: 12,
            segment_num: 0,
            total_segments: 3,
            hex_data: *b":0000",
        }
        .pack();
        assert!(matches!(
            TransferMessage::unpack(&segment),
            TransferMessage::Segment(_)
        ));
    }
}
