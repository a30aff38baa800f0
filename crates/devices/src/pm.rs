//! Power-management register block.
//!
//! A tiny MMIO window below the bridge: writing a command byte to the control
//! register asks the platform to reset or power off the machine. Nothing in
//! the window is readable; reads return zero.

use memory::MmioHandler;

pub const PM_MMIO_BASE: u64 = 0x0e00_1008_0000;
pub const PM_MMIO_SIZE: u64 = 0x100;
pub const PM_CONTROL_OFFSET: u64 = 0x10;

const PM_CMD_RESET: u8 = 0x00;
const PM_CMD_SHUTDOWN: u8 = 0xff;

/// Callbacks invoked when the guest writes a recognized control command.
#[derive(Default)]
pub struct PmCallbacks {
    pub request_reset: Option<Box<dyn FnMut()>>,
    pub request_shutdown: Option<Box<dyn FnMut()>>,
}

pub struct PmController {
    callbacks: PmCallbacks,
}

impl PmController {
    pub fn new(callbacks: PmCallbacks) -> Self {
        Self { callbacks }
    }
}

impl MmioHandler for PmController {
    fn read(&mut self, _offset: u64, _size: usize) -> u64 {
        0
    }

    fn write(&mut self, offset: u64, _size: usize, value: u64) {
        if offset != PM_CONTROL_OFFSET {
            return;
        }
        // Only the low byte of the written value is decoded.
        match value as u8 {
            PM_CMD_RESET => {
                if let Some(cb) = self.callbacks.request_reset.as_mut() {
                    cb();
                }
            }
            PM_CMD_SHUTDOWN => {
                if let Some(cb) = self.callbacks.request_shutdown.as_mut() {
                    cb();
                }
            }
            _ => {}
        }
    }
}
