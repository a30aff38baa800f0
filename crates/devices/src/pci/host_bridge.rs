use crate::pci::bus::PciDevice;
use crate::pci::config::{MaskedConfigSpace, PCI_CONFIG_SPACE_SIZE};

pub const HOST_BRIDGE_VENDOR_ID: u16 = 0x0014;
pub const HOST_BRIDGE_DEVICE_ID: u16 = 0x7a00;

/// Number of 32-bit cells in the bridge's internal register block (0xE0 bytes).
pub const INTERNAL_REG_COUNT: usize = 0xe0 / 4;

struct RegisterDefault {
    offset: u16,
    size: usize,
    value: u32,
    write_mask: u32,
    care_mask: u32,
}

const fn byte(offset: u16, value: u8, write_mask: u8, care_mask: u8) -> RegisterDefault {
    RegisterDefault {
        offset,
        size: 1,
        value: value as u32,
        write_mask: write_mask as u32,
        care_mask: care_mask as u32,
    }
}

const fn word(offset: u16, value: u16, write_mask: u16, care_mask: u16) -> RegisterDefault {
    RegisterDefault {
        offset,
        size: 2,
        value: value as u32,
        write_mask: write_mask as u32,
        care_mask: care_mask as u32,
    }
}

const fn dword(offset: u16, value: u32, write_mask: u32, care_mask: u32) -> RegisterDefault {
    RegisterDefault {
        offset,
        size: 4,
        value,
        write_mask,
        care_mask,
    }
}

/// Reset state of the bridge's config header.
///
/// Every register is guest-read-only (write mask 0); the care masks cover the
/// identity and header fields a consistency check must see unchanged. BAR3
/// reports a 64-bit memory BAR type with no address bits implemented.
const RESET_DEFAULTS: &[RegisterDefault] = &[
    word(0x00, HOST_BRIDGE_VENDOR_ID, 0x0000, 0xffff), // vendor id
    word(0x02, HOST_BRIDGE_DEVICE_ID, 0x0000, 0xffff), // device id
    word(0x04, 0x0000, 0x0000, 0x0000),                // command
    word(0x06, 0x0010, 0x0000, 0xffff),                // status: capabilities list
    byte(0x08, 0x00, 0x00, 0xff),                      // revision id
    byte(0x09, 0x00, 0x00, 0xff),                      // prog-if
    byte(0x0a, 0x00, 0x00, 0xff),                      // subclass
    byte(0x0b, 0x06, 0x00, 0xff),                      // class: bridge
    byte(0x0c, 0x00, 0x00, 0xff),                      // cache line size
    byte(0x0e, 0x80, 0x00, 0xff),                      // header type: multifunction
    dword(0x10, 0x0000_0000, 0x0000_0000, 0xffff_ffff), // BAR0
    dword(0x14, 0x0000_0000, 0x0000_0000, 0xffff_ffff), // BAR1
    dword(0x18, 0x0000_0000, 0x0000_0000, 0xffff_ffff), // BAR2
    dword(0x1c, 0x0000_0004, 0x0000_0000, 0xffff_ffff), // BAR3: 64-bit memory
    dword(0x20, 0x0000_0000, 0x0000_0000, 0xffff_ffff), // BAR4
    dword(0x24, 0x0000_0000, 0x0000_0000, 0xffff_ffff), // BAR5
    word(0x28, 0x0000, 0x0000, 0x0000),                // cardbus CIS
    word(0x2c, HOST_BRIDGE_VENDOR_ID, 0x0000, 0xffff), // subsystem vendor id
    word(0x2e, HOST_BRIDGE_DEVICE_ID, 0x0000, 0xffff), // subsystem id
    byte(0x34, 0x40, 0x00, 0xff),                      // capability pointer
    byte(0x3c, 0x00, 0x00, 0x00),                      // interrupt line
    byte(0x3d, 0x00, 0x00, 0x00),                      // interrupt pin: none
    word(0x3e, 0x0000, 0x0000, 0x0000),                // min_gnt / max_lat
    byte(0x4c, 0x60, 0x00, 0x00),                      // vendor-specific
];

/// The LS7A-style PCI host bridge.
///
/// Two guest-visible surfaces:
/// - a read-only block of 32-bit internal registers (0xE0 bytes), and
/// - a masked 256-byte PCI config header reachable through the config
///   windows, where every implemented register is read-only after reset.
pub struct Ls7aHostBridge {
    regs: [u32; INTERNAL_REG_COUNT],
    config: MaskedConfigSpace,
}

impl Default for Ls7aHostBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Ls7aHostBridge {
    pub fn new() -> Self {
        let mut bridge = Self {
            regs: [0; INTERNAL_REG_COUNT],
            config: MaskedConfigSpace::new(),
        };
        bridge.reset();
        bridge
    }

    /// Reads a cell of the internal register block.
    ///
    /// `offset` is window-relative and must be 4-byte sized by the caller;
    /// out-of-range offsets read as zero.
    pub fn internal_read(&self, offset: u64) -> u32 {
        let index = (offset >> 2) as usize;
        if offset & 0x3 != 0 {
            return 0;
        }
        self.regs.get(index).copied().unwrap_or(0)
    }

    /// Writes to the internal register block are dropped; the block is
    /// read-only from software.
    pub fn internal_write(&mut self, _offset: u64, _value: u32) {}

    /// Checks the config header against `reference` under the care masks.
    pub fn verify_config(&self, reference: &[u8; PCI_CONFIG_SPACE_SIZE]) -> bool {
        self.config.verify_against(reference)
    }
}

impl PciDevice for Ls7aHostBridge {
    fn config(&self) -> &MaskedConfigSpace {
        &self.config
    }

    fn config_mut(&mut self) -> &mut MaskedConfigSpace {
        &mut self.config
    }

    fn reset(&mut self) {
        self.regs = [0; INTERNAL_REG_COUNT];
        self.config.clear();
        for reg in RESET_DEFAULTS {
            self.config
                .set_register(reg.offset, reg.size, reg.value, reg.write_mask, reg.care_mask);
        }
    }
}
