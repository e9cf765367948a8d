use super::parser::{ParsedHexLine, RecordType};
use super::{FlashDriver, StagingConfig};

/// What the accepted records have established about the incoming image.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexFileInfo {
    /// Offset applied to every data record address, set by extended
    /// address records.
    pub base_addr: u32,
    /// Entry point from a start address record, informational only.
    pub start_addr: u32,
    pub min_addr: u32,
    pub max_addr: u32,
    pub eof_seen: bool,
}

impl HexFileInfo {
    pub fn new() -> Self {
        Self {
            base_addr: 0,
            start_addr: 0,
            min_addr: u32::MAX,
            max_addr: 0,
            eof_seen: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for HexFileInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessError {
    /// Data record ends past the staging region.
    StagingOverflow { end: u32, limit: u32 },
    /// EOF record on a line other than the last declared one.
    EarlyEof { line: u16, expected_lines: u16 },
    /// Extended address record without its two address bytes.
    BadAddressRecord,
    FlashWrite,
}

/// Applies one parsed record to the transfer.
///
/// `is_last_line` tells whether the line being processed is the final
/// declared one; only that line may carry the EOF record.
pub fn apply_record<F: FlashDriver>(
    record: &ParsedHexLine,
    info: &mut HexFileInfo,
    config: &StagingConfig,
    flash: &mut F,
    is_last_line: bool,
    line_num: u16,
    expected_lines: u16,
) -> Result<(), ProcessError> {
    match record.record_type {
        RecordType::Data => {
            let abs = info.base_addr.wrapping_add(record.address as u32);
            info.min_addr = info.min_addr.min(abs);
            info.max_addr = info.max_addr.max(abs.saturating_add(record.data.len() as u32));

            let limit = config.flash_base.saturating_add(config.staging_len);
            if info.max_addr > limit {
                return Err(ProcessError::StagingOverflow {
                    end: info.max_addr,
                    limit,
                });
            }

            let dst = config
                .staging_base
                .wrapping_add(abs.wrapping_sub(config.flash_base));
            #[cfg(not(feature = "dry-run"))]
            if flash.is_flash_address(dst) {
                flash.flash_write(dst, &record.data).map_err(|e| {
                    log_error!("flash write at {:#x} failed: {:?}", dst, e);
                    ProcessError::FlashWrite
                })?;
            } else {
                flash.ram_write(dst, &record.data);
            }
            #[cfg(feature = "dry-run")]
            let _ = (flash, dst);
            Ok(())
        }
        RecordType::EndOfFile => {
            if !is_last_line {
                return Err(ProcessError::EarlyEof {
                    line: line_num,
                    expected_lines,
                });
            }
            info.eof_seen = true;
            Ok(())
        }
        RecordType::ExtendedSegmentAddress => {
            let [hi, lo] = extended_address(record)?;
            info.base_addr = (((hi as u32) << 8) | lo as u32) << 4;
            Ok(())
        }
        RecordType::ExtendedLinearAddress => {
            let [hi, lo] = extended_address(record)?;
            info.base_addr = (((hi as u32) << 8) | lo as u32) << 16;
            Ok(())
        }
        RecordType::StartSegmentAddress | RecordType::StartLinearAddress => {
            if record.data.len() == 4 {
                info.start_addr = u32::from_be_bytes([
                    record.data[0],
                    record.data[1],
                    record.data[2],
                    record.data[3],
                ]);
            }
            Ok(())
        }
    }
}

fn extended_address(record: &ParsedHexLine) -> Result<[u8; 2], ProcessError> {
    if record.data.len() < 2 {
        return Err(ProcessError::BadAddressRecord);
    }
    Ok([record.data[0], record.data[1]])
}
