use crate::pci::config::{MaskedConfigSpace, PCI_CONFIG_SPACE_SIZE};
use crate::pci::PciBdf;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

pub trait PciDevice {
    fn config(&self) -> &MaskedConfigSpace;
    fn config_mut(&mut self) -> &mut MaskedConfigSpace;

    /// Restores the device's config space to its power-on state.
    fn reset(&mut self);
}

/// The machine's PCI bus.
///
/// Devices are held as shared handles so the platform can also reach a
/// device through its MMIO windows while its config space stays addressable
/// through the bus.
#[derive(Default)]
pub struct PciBus {
    devices: BTreeMap<PciBdf, Rc<RefCell<dyn PciDevice>>>,
}

fn all_ones(size: usize) -> u32 {
    match size {
        1 => 0xff,
        2 => 0xffff,
        _ => 0xffff_ffff,
    }
}

impl PciBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, bdf: PciBdf, device: Rc<RefCell<dyn PciDevice>>) {
        let prev = self.devices.insert(bdf, device);
        assert!(prev.is_none(), "duplicate PCI BDF {bdf:?}");
    }

    pub fn device(&self, bdf: PciBdf) -> Option<Rc<RefCell<dyn PciDevice>>> {
        self.devices.get(&bdf).cloned()
    }

    pub fn iter_device_addrs(&self) -> impl Iterator<Item = PciBdf> + '_ {
        self.devices.keys().copied()
    }

    pub fn reset(&mut self) {
        for dev in self.devices.values() {
            dev.borrow_mut().reset();
        }
    }

    pub fn read_config(&mut self, bdf: PciBdf, offset: u16, size: usize) -> u32 {
        if usize::from(offset) + size > PCI_CONFIG_SPACE_SIZE {
            return all_ones(size);
        }
        let Some(dev) = self.devices.get(&bdf) else {
            // All-ones for a non-existent device (master abort convention).
            return all_ones(size);
        };
        dev.borrow().config().read(offset, size)
    }

    pub fn write_config(&mut self, bdf: PciBdf, offset: u16, size: usize, value: u32) {
        if usize::from(offset) + size > PCI_CONFIG_SPACE_SIZE {
            return;
        }
        let Some(dev) = self.devices.get(&bdf) else {
            return;
        };
        dev.borrow_mut().config_mut().write(offset, size, value);
    }

    /// Reads through a generic configuration transaction address:
    /// bits 16..=23 bus, 11..=15 device, 8..=10 function, 0..=7 register.
    pub fn data_read(&mut self, addr: u32, size: usize) -> u32 {
        let (bdf, offset) = decode_config_addr(addr);
        self.read_config(bdf, offset, size)
    }

    /// Writes through a generic configuration transaction address.
    pub fn data_write(&mut self, addr: u32, size: usize, value: u32) {
        let (bdf, offset) = decode_config_addr(addr);
        self.write_config(bdf, offset, size, value);
    }
}

fn decode_config_addr(addr: u32) -> (PciBdf, u16) {
    let bus = ((addr >> 16) & 0xff) as u8;
    let device = ((addr >> 11) & 0x1f) as u8;
    let function = ((addr >> 8) & 0x07) as u8;
    let offset = (addr & 0xff) as u16;
    (PciBdf::new(bus, device, function), offset)
}
