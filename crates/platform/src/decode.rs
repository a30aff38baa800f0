//! Physical-address decoding for the north bridge windows.
//!
//! The bridge claims three fixed windows on the system bus:
//!
//! * the internal register file at `0x1fe0_0100`,
//! * the local configuration window at `0x1fe0_0000` (the bridge's own
//!   config header),
//! * the extended configuration window at `0x1a00_0000` (full
//!   bus/device/function addressing).
//!
//! The extended window is 32 MiB but only partially decoded: with bit 24 set
//! the access folds onto the low 64 KiB of the transaction address space,
//! otherwise onto the low 16 MiB.

pub const INTERNAL_REG_BASE: u64 = 0x1fe0_0100;
pub const INTERNAL_REG_SIZE: u64 = 0xe0;

pub const LOCAL_CONFIG_BASE: u64 = 0x1fe0_0000;
pub const LOCAL_CONFIG_SIZE: u64 = 0x100;

pub const EXTENDED_CONFIG_BASE: u64 = 0x1a00_0000;
pub const EXTENDED_CONFIG_SIZE: u64 = 0x0200_0000;

/// A physical access resolved to one of the bridge windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedAccess {
    /// Window-relative offset into the internal register file.
    InternalReg { offset: u64 },
    /// Register offset within the bridge's own config header.
    LocalConfig { offset: u64 },
    /// Folded configuration transaction address
    /// (bits 16..=23 bus, 11..=15 device, 8..=10 function, 0..=7 register).
    ExtendedConfig { effective: u32 },
}

/// Resolves a physical address against the bridge windows.
///
/// Returns `None` for addresses the bridge does not claim.
pub fn decode(paddr: u64) -> Option<DecodedAccess> {
    if (INTERNAL_REG_BASE..INTERNAL_REG_BASE + INTERNAL_REG_SIZE).contains(&paddr) {
        return Some(DecodedAccess::InternalReg {
            offset: paddr - INTERNAL_REG_BASE,
        });
    }
    if (LOCAL_CONFIG_BASE..LOCAL_CONFIG_BASE + LOCAL_CONFIG_SIZE).contains(&paddr) {
        return Some(DecodedAccess::LocalConfig {
            offset: paddr - LOCAL_CONFIG_BASE,
        });
    }
    if (EXTENDED_CONFIG_BASE..EXTENDED_CONFIG_BASE + EXTENDED_CONFIG_SIZE).contains(&paddr) {
        return Some(DecodedAccess::ExtendedConfig {
            effective: fold_extended(paddr - EXTENDED_CONFIG_BASE),
        });
    }
    None
}

/// Folds an extended-window offset onto a configuration transaction address.
pub fn fold_extended(window_offset: u64) -> u32 {
    debug_assert!(window_offset < EXTENDED_CONFIG_SIZE);
    if window_offset & 0x0100_0000 != 0 {
        (window_offset & 0xffff) as u32
    } else {
        (window_offset & 0x00ff_ffff) as u32
    }
}
