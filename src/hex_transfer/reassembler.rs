use super::messages::segment::SegmentMessage;
use super::{MAX_CHUNKS_PER_HEX_LINE, MAX_HEX_CHUNK_SIZE, MAX_HEX_LINE_SIZE, PAD};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReassembleError {
    /// Segment belongs to a different line than the one being received.
    LineMismatch { expected: u16, got: u16 },
    /// Segment carries a different total than the first segment of the line.
    TotalsMismatch { expected: u8, got: u8 },
    /// Segment index outside the declared total or the buffer.
    BadSegmentIndex { index: u8, total: u8 },
}

/// Reassembles one HEX line from up to nine 5-byte segments, in any
/// arrival order. Duplicates are accepted and overwrite identically.
pub struct LineReassembler {
    text: [u8; MAX_HEX_LINE_SIZE],
    total_segments: Option<u8>,
    received_mask: u16,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self {
            text: [PAD; MAX_HEX_LINE_SIZE],
            total_segments: None,
            received_mask: 0,
        }
    }

    pub fn reset(&mut self) {
        self.text = [PAD; MAX_HEX_LINE_SIZE];
        self.total_segments = None;
        self.received_mask = 0;
    }

    pub fn accept(
        &mut self,
        msg: &SegmentMessage,
        expected_line: u16,
    ) -> Result<(), ReassembleError> {
        if msg.line_num != expected_line {
            return Err(ReassembleError::LineMismatch {
                expected: expected_line,
                got: msg.line_num,
            });
        }

        // the first segment of a line decides the total for the rest
        let total = match self.total_segments {
            None => {
                if msg.total_segments == 0
                    || msg.total_segments as usize > MAX_CHUNKS_PER_HEX_LINE
                {
                    return Err(ReassembleError::BadSegmentIndex {
                        index: msg.segment_num,
                        total: msg.total_segments,
                    });
                }
                self.total_segments = Some(msg.total_segments);
                msg.total_segments
            }
            Some(total) => {
                if msg.total_segments != total {
                    return Err(ReassembleError::TotalsMismatch {
                        expected: total,
                        got: msg.total_segments,
                    });
                }
                total
            }
        };

        if msg.segment_num >= total || msg.segment_num as usize >= MAX_CHUNKS_PER_HEX_LINE {
            return Err(ReassembleError::BadSegmentIndex {
                index: msg.segment_num,
                total,
            });
        }

        let start = msg.segment_num as usize * MAX_HEX_CHUNK_SIZE;
        self.text[start..start + MAX_HEX_CHUNK_SIZE].copy_from_slice(&msg.hex_data);
        self.received_mask |= 1 << msg.segment_num;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        match self.total_segments {
            Some(total) => {
                let want = (1u16 << total) - 1;
                self.received_mask & want == want
            }
            None => false,
        }
    }

    pub fn text(&self) -> &[u8; MAX_HEX_LINE_SIZE] {
        &self.text
    }

    /// Line text up to the first PAD byte.
    pub fn line_bytes(&self) -> &[u8] {
        let len = self
            .text
            .iter()
            .position(|&b| b == PAD)
            .unwrap_or(MAX_HEX_LINE_SIZE);
        &self.text[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::init_logger;

    fn segment(line_num: u16, segment_num: u8, total_segments: u8, data: &[u8]) -> SegmentMessage {
        let mut hex_data = [PAD; MAX_HEX_CHUNK_SIZE];
        hex_data[..data.len()].copy_from_slice(data);
        SegmentMessage {
            line_num,
            segment_num,
            total_segments,
            hex_data,
        }
    }

    #[test]
    fn collects_segments_in_any_order() {
        init_logger();

        let mut ordered = LineReassembler::new();
        let mut shuffled = LineReassembler::new();
        let segments = [
            segment(0, 0, 3, b":0000"),
            segment(0, 1, 3, b"0001F"),
            segment(0, 2, 3, b"F"),
        ];

        for seg in &segments {
            ordered.accept(seg, 0).unwrap();
        }
        for i in [2usize, 0, 1] {
            assert!(!shuffled.is_complete());
            shuffled.accept(&segments[i], 0).unwrap();
        }

        assert!(ordered.is_complete());
        assert!(shuffled.is_complete());
        assert_eq!(ordered.text(), shuffled.text());
        assert_eq!(ordered.line_bytes(), b":00000001FF");
    }

    #[test]
    fn duplicates_are_idempotent() {
        init_logger();

        let mut line = LineReassembler::new();
        let seg = segment(3, 0, 2, b":0000");
        line.accept(&seg, 3).unwrap();
        line.accept(&seg, 3).unwrap();
        assert!(!line.is_complete());
        line.accept(&segment(3, 1, 2, b"0001F"), 3).unwrap();
        assert!(line.is_complete());
    }

    #[test]
    fn rejects_wrong_line() {
        init_logger();

        let mut line = LineReassembler::new();
        assert_eq!(
            line.accept(&segment(6, 0, 1, b":00"), 5),
            Err(ReassembleError::LineMismatch {
                expected: 5,
                got: 6
            })
        );
        assert!(!line.is_complete());
    }

    #[test]
    fn rejects_changed_total() {
        init_logger();

        let mut line = LineReassembler::new();
        line.accept(&segment(0, 0, 3, b":0000"), 0).unwrap();
        assert_eq!(
            line.accept(&segment(0, 1, 4, b"0001F"), 0),
            Err(ReassembleError::TotalsMismatch {
                expected: 3,
                got: 4
            })
        );
        // a matching duplicate is still fine afterwards
        line.accept(&segment(0, 0, 3, b":0000"), 0).unwrap();
    }

    #[test]
    fn rejects_out_of_range_index() {
        init_logger();

        let mut line = LineReassembler::new();
        line.accept(&segment(0, 0, 2, b":0000"), 0).unwrap();
        assert_eq!(
            line.accept(&segment(0, 2, 2, b"0001F"), 0),
            Err(ReassembleError::BadSegmentIndex { index: 2, total: 2 })
        );
    }

    #[test]
    fn rejects_total_outside_buffer() {
        init_logger();

        let mut line = LineReassembler::new();
        assert_eq!(
            line.accept(&segment(0, 0, 10, b":0000"), 0),
            Err(ReassembleError::BadSegmentIndex {
                index: 0,
                total: 10
            })
        );
        assert_eq!(
            line.accept(&segment(0, 0, 0, b":0000"), 0),
            Err(ReassembleError::BadSegmentIndex { index: 0, total: 0 })
        );
        // nothing was latched, a sane first segment still works
        line.accept(&segment(0, 0, 3, b":0000"), 0).unwrap();
        assert!(!line.is_complete());
    }

    #[test]
    fn reset_clears_everything() {
        init_logger();

        let mut line = LineReassembler::new();
        line.accept(&segment(0, 0, 1, b":00"), 0).unwrap();
        assert!(line.is_complete());
        line.reset();
        assert!(!line.is_complete());
        assert_eq!(line.line_bytes(), b"");
    }
}
