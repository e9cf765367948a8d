use crc::{Crc, CRC_32_ISO_HDLC};

pub mod daemon;
pub mod messages;
pub mod parser;
pub mod reassembler;
pub mod records;
pub mod session;

/// Max length of one Intel HEX line of the transfer, in bytes.
pub const MAX_HEX_LINE_SIZE: usize = 45;
/// Bytes of HEX line text carried by one segment frame.
pub const MAX_HEX_CHUNK_SIZE: usize = 5;
pub const MAX_CHUNKS_PER_HEX_LINE: usize = 9;
/// Fills unused positions of the fixed-width line buffer.
pub const PAD: u8 = 0xFF;

/// After this much silence the current line is re-requested.
pub const HEX_LINE_TIMEOUT_MS: u32 = 5_000;
/// After this much silence the whole transfer is aborted.
pub const INACTIVITY_TIMEOUT_MS: u32 = 15_000;

// CRC-32 used for both the init message checksum and the rolling file
// checksum. A static rather than a const: the session keeps a running
// Digest borrowing the lookup table.
pub(crate) static TRANSFER_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Flash driver boundary. The core decides which side of the boundary a
/// write lands on via `is_flash_address`; staging regions living in RAM
/// (host-side dry runs, RAM-backed staging) take the `ram_write` path.
pub trait FlashDriver {
    #[cfg(feature = "defmt")]
    type Error: defmt::Format + core::fmt::Debug;
    #[cfg(not(feature = "defmt"))]
    type Error: core::fmt::Debug;

    fn flash_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    fn is_flash_address(&self, addr: u32) -> bool;

    fn ram_write(&mut self, addr: u32, data: &[u8]);
}

/// Where the incoming image is staged, configured before a session starts.
///
/// `flash_base` is the platform constant delimiting physical flash; image
/// addresses are translated by `staging_base - flash_base` before writing.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagingConfig {
    pub staging_base: u32,
    pub staging_len: u32,
    pub flash_base: u32,
}
