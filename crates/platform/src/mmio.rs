//! Flat MMIO region table.
//!
//! Devices outside the bridge windows (today just the power-management
//! block) register a handler against a base/size pair. Accesses to
//! unregistered addresses read zero and drop writes.

use memory::MmioHandler;

struct MmioRegion {
    base: u64,
    size: u64,
    handler: Box<dyn MmioHandler>,
}

#[derive(Default)]
pub struct MmioBus {
    regions: Vec<MmioRegion>,
}

impl MmioBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `[base, base + size)`.
    ///
    /// Panics on a zero-sized, wrapping, or overlapping region; the region
    /// table is fixed at machine construction.
    pub fn register(&mut self, base: u64, size: u64, handler: Box<dyn MmioHandler>) {
        assert!(size > 0, "zero-sized MMIO region at {base:#x}");
        let end = base
            .checked_add(size)
            .unwrap_or_else(|| panic!("MMIO region at {base:#x} wraps the address space"));
        for region in &self.regions {
            let overlaps = base < region.base + region.size && region.base < end;
            assert!(
                !overlaps,
                "MMIO region at {base:#x} overlaps one at {:#x}",
                region.base
            );
        }
        self.regions.push(MmioRegion {
            base,
            size,
            handler,
        });
    }

    fn find(&mut self, paddr: u64) -> Option<(&mut Box<dyn MmioHandler>, u64)> {
        self.regions
            .iter_mut()
            .find(|r| paddr >= r.base && paddr - r.base < r.size)
            .map(|r| (&mut r.handler, paddr - r.base))
    }

    pub fn read(&mut self, paddr: u64, size: usize) -> u64 {
        match self.find(paddr) {
            Some((handler, offset)) => handler.read(offset, size),
            None => 0,
        }
    }

    pub fn write(&mut self, paddr: u64, size: usize, value: u64) {
        if let Some((handler, offset)) = self.find(paddr) {
            handler.write(offset, size, value);
        }
    }
}
