use std::cell::Cell;
use std::rc::Rc;

#[cfg(feature = "log")]
use log::LevelFilter;

use crate::hex_transfer::{Clock, FlashDriver};

pub fn init_logger() {
    #[cfg(feature = "log")]
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .filter(Some("can_hex_transfer"), LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Flash driver double recording every write it is asked to do.
pub(crate) struct MockFlash {
    pub flash_start: u32,
    pub flash_end: u32,
    pub fail_flash_writes: bool,
    pub flash_writes: Vec<(u32, Vec<u8>)>,
    pub ram_writes: Vec<(u32, Vec<u8>)>,
}

impl MockFlash {
    /// No physical flash at all; every write takes the RAM path.
    pub fn ram_only() -> Self {
        Self::with_flash_range(0, 0)
    }

    pub fn with_flash_range(flash_start: u32, flash_end: u32) -> Self {
        Self {
            flash_start,
            flash_end,
            fail_flash_writes: false,
            flash_writes: Vec::new(),
            ram_writes: Vec::new(),
        }
    }
}

impl FlashDriver for MockFlash {
    type Error = ();

    fn flash_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_flash_writes {
            return Err(());
        }
        self.flash_writes.push((addr, data.to_vec()));
        Ok(())
    }

    fn is_flash_address(&self, addr: u32) -> bool {
        addr >= self.flash_start && addr < self.flash_end
    }

    fn ram_write(&mut self, addr: u32, data: &[u8]) {
        self.ram_writes.push((addr, data.to_vec()));
    }
}

/// Manually advanced millisecond clock shared between test and session.
#[derive(Clone, Default)]
pub(crate) struct MockClock(Rc<Cell<u32>>);

impl MockClock {
    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }
}
