//! PCI core types for the north-bridge device models.

pub mod bus;
pub mod config;
pub mod host_bridge;
pub mod irq_router;

pub use bus::{PciBus, PciDevice};
pub use config::MaskedConfigSpace;
pub use host_bridge::Ls7aHostBridge;
pub use irq_router::{route_intx, PciIntxRouter, PCI_IRQ_LINES};

/// PCI bus/device/function identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PciBdf {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciBdf {
    /// Creates a new BDF.
    ///
    /// The caller is responsible for ensuring the values are within the PCI ranges:
    /// bus < 256, device < 32, function < 8.
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }

    /// Packs this BDF into a compact `u16` key using the standard PCI config-address bit layout.
    ///
    /// Layout (LSB..MSB):
    /// - bits 0..=2: function (0-7)
    /// - bits 3..=7: device (0-31)
    /// - bits 8..=15: bus (0-255)
    pub const fn pack_u16(self) -> u16 {
        debug_assert!(self.device < 32);
        debug_assert!(self.function < 8);
        ((self.bus as u16) << 8) | ((self.device as u16) << 3) | (self.function as u16)
    }

    /// Unpacks a `u16` produced by [`PciBdf::pack_u16`] back into a [`PciBdf`].
    pub const fn unpack_u16(v: u16) -> Self {
        let bus = (v >> 8) as u8;
        let device = ((v >> 3) & 0x1f) as u8;
        let function = (v & 0x7) as u8;

        Self {
            bus,
            device,
            function,
        }
    }
}

impl From<PciBdf> for u16 {
    fn from(value: PciBdf) -> Self {
        value.pack_u16()
    }
}

impl From<u16> for PciBdf {
    fn from(value: u16) -> Self {
        Self::unpack_u16(value)
    }
}

impl core::cmp::Ord for PciBdf {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.bus, self.device, self.function).cmp(&(other.bus, other.device, other.function))
    }
}

impl core::cmp::PartialOrd for PciBdf {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
