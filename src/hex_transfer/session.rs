use crc::Digest;

use super::messages::init::InitMessage;
use super::messages::response::{ErrorCode, Response};
use super::messages::segment::SegmentMessage;
use super::messages::TransferMessage;
use super::parser::parse_hex_line;
use super::reassembler::LineReassembler;
use super::records::{apply_record, HexFileInfo};
use super::{
    Clock, FlashDriver, StagingConfig, HEX_LINE_TIMEOUT_MS, INACTIVITY_TIMEOUT_MS, TRANSFER_CRC,
};

/// One firmware transfer session, owning everything between the CAN link
/// and the flash driver.
///
/// `handle_frame` consumes inbound frames and never responds by itself;
/// all responses come out of the periodic `update`, at most one per call.
/// Per-line failures (parse, processing) are recovered by re-requesting
/// the current line; only a bad init checksum, a file checksum mismatch
/// and the inactivity timeout are surfaced as error responses.
pub struct TransferSession<F: FlashDriver, C: Clock> {
    flash: F,
    clock: C,
    config: StagingConfig,

    in_progress: bool,
    complete: bool,
    expected_lines: u16,
    expected_file_crc: u32,
    current_line_idx: u16,
    file_crc: Digest<'static, u32>,
    file: HexFileInfo,
    line: LineReassembler,
    last_activity_ms: u32,
    init_ack_pending: bool,
    init_checksum_error: bool,
}

impl<F: FlashDriver, C: Clock> TransferSession<F, C> {
    pub fn new(flash: F, clock: C, config: StagingConfig) -> Self {
        let last_activity_ms = clock.now_ms();
        Self {
            flash,
            clock,
            config,
            in_progress: false,
            complete: false,
            expected_lines: 0,
            expected_file_crc: 0,
            current_line_idx: 0,
            file_crc: TRANSFER_CRC.digest(),
            file: HexFileInfo::new(),
            line: LineReassembler::new(),
            last_activity_ms,
            init_ack_pending: false,
            init_checksum_error: false,
        }
    }

    /// Drops everything back to idle.
    pub fn reset(&mut self) {
        self.in_progress = false;
        self.complete = false;
        self.expected_lines = 0;
        self.expected_file_crc = 0;
        self.current_line_idx = 0;
        self.file_crc = TRANSFER_CRC.digest();
        self.file.reset();
        self.line.reset();
        self.init_ack_pending = false;
        self.init_checksum_error = false;
        self.last_activity_ms = self.clock.now_ms();
    }

    /// Feeds one 8-byte frame of this service into the session.
    pub fn handle_frame(&mut self, buf: &[u8; 8]) {
        match TransferMessage::unpack(buf) {
            TransferMessage::Init(init) => self.handle_init(buf, init),
            TransferMessage::Segment(segment) => self.handle_segment(&segment),
        }
    }

    fn handle_init(&mut self, buf: &[u8; 8], init: InitMessage) {
        if !InitMessage::checksum_ok(buf) {
            log_warn!(
                "init message failed its checksum, declared {:#x}",
                init.init_msg_checksum
            );
            self.init_ack_pending = true;
            self.init_checksum_error = true;
            self.last_activity_ms = self.clock.now_ms();
            return;
        }

        log_info!(
            "transfer armed: {} lines, file crc {:#x}",
            init.line_count,
            init.file_checksum
        );
        // an in-flight transfer is discarded by a new init
        self.reset();
        self.in_progress = true;
        self.expected_lines = init.line_count;
        self.expected_file_crc = init.file_checksum;
        self.init_ack_pending = true;
    }

    fn handle_segment(&mut self, msg: &SegmentMessage) {
        if !self.in_progress {
            log_warn!(
                "segment for line {} with no transfer in progress",
                msg.line_num
            );
            return;
        }

        log_trace!(
            "segment {}/{} of line {}: {}",
            msg.segment_num,
            msg.total_segments,
            msg.line_num,
            core::str::from_utf8(&msg.printable_data()).unwrap_or("....."),
        );

        match self.line.accept(msg, self.current_line_idx) {
            Ok(()) => self.last_activity_ms = self.clock.now_ms(),
            Err(e) => log_warn!("segment dropped: {:?}", e),
        }
    }

    /// Periodic tick. Emits at most one response frame per call.
    pub fn update(&mut self) -> Option<Response> {
        let now = self.clock.now_ms();

        if !self.in_progress {
            // a rejected init never arms a session but still gets its ack
            if self.init_ack_pending {
                self.init_ack_pending = false;
                if self.init_checksum_error {
                    self.init_checksum_error = false;
                    return Some(Response::Error {
                        code: ErrorCode::InitChecksum,
                    });
                }
            }
            return None;
        }

        let idle_ms = now.wrapping_sub(self.last_activity_ms);
        if idle_ms > INACTIVITY_TIMEOUT_MS {
            log_warn!("transfer aborted after {} ms of inactivity", idle_ms);
            self.reset();
            return Some(Response::Error {
                code: ErrorCode::InactivityTimeout,
            });
        }
        if idle_ms > HEX_LINE_TIMEOUT_MS {
            return Some(Response::SendLine {
                line_num: self.current_line_idx,
            });
        }

        if self.init_ack_pending {
            self.init_ack_pending = false;
            if self.init_checksum_error {
                self.init_checksum_error = false;
                return Some(Response::Error {
                    code: ErrorCode::InitChecksum,
                });
            }
            return Some(Response::SendLine { line_num: 0 });
        }

        if self.line.is_complete() {
            return Some(self.finish_line());
        }

        if self.file.eof_seen {
            return Some(self.finalize());
        }

        None
    }

    fn finish_line(&mut self) -> Response {
        let text = *self.line.text();
        match parse_hex_line(&text) {
            Ok(record) => {
                let is_last = self.current_line_idx + 1 == self.expected_lines;
                match apply_record(
                    &record,
                    &mut self.file,
                    &self.config,
                    &mut self.flash,
                    is_last,
                    self.current_line_idx,
                    self.expected_lines,
                ) {
                    Ok(()) => {
                        log_debug!("line {} accepted", self.current_line_idx);
                        self.file_crc.update(self.line.line_bytes());
                        self.current_line_idx += 1;
                        self.line.reset();
                        return Response::SendLine {
                            line_num: self.current_line_idx,
                        };
                    }
                    Err(e) => {
                        log_warn!("line {} rejected: {:?}", self.current_line_idx, e);
                    }
                }
            }
            Err(e) => {
                log_warn!("line {} failed to parse: {:?}", self.current_line_idx, e);
            }
        }

        // failed lines are re-requested, nothing advances
        self.line.reset();
        Response::SendLine {
            line_num: self.current_line_idx,
        }
    }

    fn finalize(&mut self) -> Response {
        let computed =
            core::mem::replace(&mut self.file_crc, TRANSFER_CRC.digest()).finalize();
        if computed == self.expected_file_crc {
            log_info!(
                "transfer complete: {} lines, image {:#x}..{:#x}",
                self.expected_lines,
                self.file.min_addr,
                self.file.max_addr,
            );
            self.in_progress = false;
            self.complete = true;
            Response::TransferComplete
        } else {
            log_warn!(
                "file checksum mismatch: computed {:#x}, expected {:#x}",
                computed,
                self.expected_file_crc,
            );
            self.reset();
            Response::Error {
                code: ErrorCode::FileChecksum,
            }
        }
    }

    pub fn is_transfer_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn is_file_transfer_complete(&self) -> bool {
        self.complete
    }

    /// Lines fully received so far and the declared total.
    pub fn progress(&self) -> (u16, u16) {
        (self.current_line_idx, self.expected_lines)
    }

    /// Bounds of the image data written so far, if any data record landed.
    pub fn image_bounds(&self) -> Option<(u32, u32)> {
        if self.file.min_addr <= self.file.max_addr && self.file.max_addr > 0 {
            Some((self.file.min_addr, self.file.max_addr))
        } else {
            None
        }
    }

    pub fn driver(&self) -> &F {
        &self.flash
    }
}
