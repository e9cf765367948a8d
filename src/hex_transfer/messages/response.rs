use serde::{Deserialize, Serialize};

/// Low nibble of byte 0 of every response frame.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseCode {
    None = 0,
    SendLine = 1,
    TransferComplete = 2,
    Error = 3,
}

/// Session-fatal conditions surfaced to the host. Per-line failures are
/// recovered with repeat-line requests instead and never appear here.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    InitChecksum = 0,
    TransferNotInProgress = 1,
    FileChecksum = 2,
    InactivityTimeout = 3,
}

impl ErrorCode {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ErrorCode::InitChecksum),
            1 => Some(ErrorCode::TransferNotInProgress),
            2 => Some(ErrorCode::FileChecksum),
            3 => Some(ErrorCode::InactivityTimeout),
            _ => None,
        }
    }
}

/// One acknowledgement frame from the device to the host.
///
/// SEND_LINE carries the requested line number in bytes 1..2 (little
/// endian), ERROR carries the error code in byte 1. All remaining bytes
/// are zero and hosts must treat them as such.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    SendLine { line_num: u16 },
    TransferComplete,
    Error { code: ErrorCode },
}

impl Response {
    pub fn code(&self) -> ResponseCode {
        match self {
            Response::SendLine { .. } => ResponseCode::SendLine,
            Response::TransferComplete => ResponseCode::TransferComplete,
            Response::Error { .. } => ResponseCode::Error,
        }
    }

    pub fn pack(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0] = self.code() as u8;
        match self {
            Response::SendLine { line_num } => {
                buf[1..3].copy_from_slice(&line_num.to_le_bytes());
            }
            Response::TransferComplete => {}
            Response::Error { code } => {
                buf[1] = *code as u8;
            }
        }
        buf
    }

    /// Host-side decoder. A NONE code or an unknown code or error byte
    /// decodes to no response.
    pub fn unpack(buf: &[u8; 8]) -> Option<Self> {
        match buf[0] & 0x0F {
            1 => Some(Response::SendLine {
                line_num: u16::from_le_bytes([buf[1], buf[2]]),
            }),
            2 => Some(Response::TransferComplete),
            3 => ErrorCode::from_u8(buf[1]).map(|code| Response::Error { code }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::init_logger;

    #[test]
    fn pack_unpack_round_trip() {
        init_logger();

        for response in [
            Response::SendLine { line_num: 0 },
            Response::SendLine { line_num: 0x7FFF },
            Response::TransferComplete,
            Response::Error {
                code: ErrorCode::FileChecksum,
            },
        ] {
            assert_eq!(Response::unpack(&response.pack()), Some(response));
        }
    }

    #[test]
    fn none_code_decodes_to_nothing() {
        init_logger();

        assert_eq!(Response::unpack(&[0u8; 8]), None);
    }

    #[test]
    fn send_line_payload_is_little_endian() {
        init_logger();

        let buf = Response::SendLine { line_num: 0x0102 }.pack();
        assert_eq!(buf[0], 1);
        assert_eq!(buf[1], 0x02);
        assert_eq!(buf[2], 0x01);
        assert_eq!(&buf[3..], &[0u8; 5]);
    }
}
