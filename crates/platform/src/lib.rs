#![forbid(unsafe_code)]

//! Platform assembly for a Loongson-3 virt board.
//!
//! [`Machine`] wires the pieces together: guest RAM with the firmware
//! parameter region staged in it, the PCI bus with the LS7A host bridge at
//! 0:00.0, the bridge's three MMIO windows, the INTx router, and the
//! power-management block. The CPU itself lives elsewhere; the machine
//! exposes a physical MMIO read/write pair and the kernel entry registers.

pub mod decode;
pub mod mmio;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use firmware::bootinfo::{BOOT_PARAMS_PHYS_ADDR, PARAMS_REGION_SIZE};
use firmware::{
    host, BootInfoBlob, BootInfoConfig, BootInfoError, KernelArgs, PromArgs, PromConfig, PromInitrd,
};
use loong_devices::irq::IrqLineSink;
use loong_devices::pci::{Ls7aHostBridge, PciBdf, PciBus, PciIntxRouter};
use loong_devices::{PmCallbacks, PmController};
use memory::{GuestMemory, GuestMemoryError, SparseMemory};

use crate::decode::{decode, DecodedAccess};
use crate::mmio::MmioBus;

/// The firmware memory map assumes the hole at 256 MiB is backed on both
/// sides; smaller machines are rejected outright.
pub const MIN_RAM_BYTES: u64 = 256 << 20;

const HOST_BRIDGE_BDF: PciBdf = PciBdf::new(0, 0, 0);

/// Out-of-band requests raised by the guest (via the PM block) for the
/// embedder to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    Reset,
    Shutdown,
}

#[derive(Debug)]
pub enum MachineError {
    RamTooSmall { ram_bytes: u64 },
    Memory(GuestMemoryError),
    BootInfo(BootInfoError),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::RamTooSmall { ram_bytes } => write!(
                f,
                "machine needs at least {MIN_RAM_BYTES:#x} bytes of RAM, got {ram_bytes:#x}"
            ),
            MachineError::Memory(e) => write!(f, "guest memory: {e}"),
            MachineError::BootInfo(e) => write!(f, "boot info: {e}"),
        }
    }
}

impl std::error::Error for MachineError {}

impl From<GuestMemoryError> for MachineError {
    fn from(e: GuestMemoryError) -> Self {
        MachineError::Memory(e)
    }
}

impl From<BootInfoError> for MachineError {
    fn from(e: BootInfoError) -> Self {
        MachineError::BootInfo(e)
    }
}

#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub ram_bytes: u64,
    pub cpu_count: u32,
    pub kernel_cmdline: String,
    pub initrd: Option<PromInitrd>,
    /// Reported CPU clock; `None` probes the host.
    pub cpu_clock_hz: Option<u32>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_bytes: 512 << 20,
            cpu_count: 1,
            kernel_cmdline: String::new(),
            initrd: None,
            cpu_clock_hz: None,
        }
    }
}

/// Levels of the platform interrupt lines the bridge can drive.
#[derive(Default)]
struct LineLevels {
    level: [bool; 16],
}

impl IrqLineSink for LineLevels {
    fn set_irq_level(&mut self, line: u8, level: bool) {
        if let Some(slot) = self.level.get_mut(usize::from(line)) {
            *slot = level;
        }
    }
}

pub struct Machine {
    ram: SparseMemory,
    mmio: MmioBus,
    bridge: Rc<RefCell<Ls7aHostBridge>>,
    pci: Rc<RefCell<PciBus>>,
    intx: PciIntxRouter,
    irq_levels: LineLevels,
    events: Rc<RefCell<VecDeque<PlatformEvent>>>,
    kernel_args: KernelArgs,
}

impl Machine {
    pub fn new(config: &MachineConfig) -> Result<Self, MachineError> {
        if config.ram_bytes < MIN_RAM_BYTES {
            return Err(MachineError::RamTooSmall {
                ram_bytes: config.ram_bytes,
            });
        }
        let mut ram = SparseMemory::new(config.ram_bytes)?;

        // Stage the PROM argument area, then the boot-information tables
        // right behind it in the reserved parameter region.
        let prom = PromArgs::build(&PromConfig {
            kernel_cmdline: config.kernel_cmdline.clone(),
            initrd: config.initrd,
            ram_bytes: config.ram_bytes,
        });
        let cpu_clock_hz = config.cpu_clock_hz.unwrap_or_else(host::host_cpu_freq_hz);
        let blob = BootInfoBlob::build(
            &BootInfoConfig {
                ram_bytes: config.ram_bytes,
                cpu_count: config.cpu_count,
                cpu_clock_hz,
            },
            PARAMS_REGION_SIZE - prom.boot_params_offset(),
        )?;
        ram.write_from(BOOT_PARAMS_PHYS_ADDR, prom.bytes())?;
        blob.install(
            &mut ram,
            BOOT_PARAMS_PHYS_ADDR + prom.boot_params_offset() as u64,
        )?;

        let bridge = Rc::new(RefCell::new(Ls7aHostBridge::new()));
        let pci = Rc::new(RefCell::new(PciBus::new()));
        pci.borrow_mut().add_device(HOST_BRIDGE_BDF, bridge.clone());

        let events: Rc<RefCell<VecDeque<PlatformEvent>>> = Rc::new(RefCell::new(VecDeque::new()));
        let pm = PmController::new(PmCallbacks {
            request_reset: Some(Box::new({
                let events = events.clone();
                move || events.borrow_mut().push_back(PlatformEvent::Reset)
            })),
            request_shutdown: Some(Box::new({
                let events = events.clone();
                move || events.borrow_mut().push_back(PlatformEvent::Shutdown)
            })),
        });

        let mut mmio = MmioBus::new();
        mmio.register(
            loong_devices::pm::PM_MMIO_BASE,
            loong_devices::pm::PM_MMIO_SIZE,
            Box::new(pm),
        );

        Ok(Self {
            ram,
            mmio,
            bridge,
            pci,
            intx: PciIntxRouter::new(),
            irq_levels: LineLevels::default(),
            events,
            kernel_args: prom.kernel_args(),
        })
    }

    /// Register values for entering the kernel (`a0` = argc, `a1` = argv,
    /// `a2` = boot-information tables).
    pub fn kernel_args(&self) -> KernelArgs {
        self.kernel_args
    }

    pub fn memory(&self) -> &SparseMemory {
        &self.ram
    }

    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.ram
    }

    /// The PCI bus, for installing devices behind the bridge.
    pub fn pci_bus(&self) -> Rc<RefCell<PciBus>> {
        self.pci.clone()
    }

    /// Performs a physical read against the bridge windows and the MMIO
    /// region table. Addresses nothing claims read zero.
    pub fn mmio_read(&mut self, paddr: u64, size: usize) -> u64 {
        match decode(paddr) {
            Some(DecodedAccess::InternalReg { offset }) => {
                // The register file only answers aligned dword reads.
                if size == 4 {
                    u64::from(self.bridge.borrow().internal_read(offset))
                } else {
                    0
                }
            }
            Some(DecodedAccess::LocalConfig { offset }) => {
                if size == 4 {
                    u64::from(
                        self.pci
                            .borrow_mut()
                            .read_config(HOST_BRIDGE_BDF, offset as u16, 4),
                    )
                } else {
                    0
                }
            }
            Some(DecodedAccess::ExtendedConfig { effective }) => {
                if matches!(size, 1 | 2 | 4) {
                    u64::from(self.pci.borrow_mut().data_read(effective, size))
                } else {
                    0
                }
            }
            None => self.mmio.read(paddr, size),
        }
    }

    /// Performs a physical write against the bridge windows and the MMIO
    /// region table. Writes nothing claims are dropped.
    pub fn mmio_write(&mut self, paddr: u64, size: usize, value: u64) {
        match decode(paddr) {
            Some(DecodedAccess::InternalReg { offset }) => {
                if size == 4 {
                    self.bridge.borrow_mut().internal_write(offset, value as u32);
                }
            }
            Some(DecodedAccess::LocalConfig { offset }) => {
                if size == 4 {
                    self.pci.borrow_mut().write_config(
                        HOST_BRIDGE_BDF,
                        offset as u16,
                        4,
                        value as u32,
                    );
                }
            }
            Some(DecodedAccess::ExtendedConfig { effective }) => {
                if matches!(size, 1 | 2 | 4) {
                    self.pci
                        .borrow_mut()
                        .data_write(effective, size, value as u32);
                }
            }
            None => self.mmio.write(paddr, size, value),
        }
    }

    /// Drives a device's INTx pin; the router maps it onto a platform line.
    pub fn set_intx_level(&mut self, slot: u8, pin: u8, level: bool) {
        self.intx
            .set_intx_level(slot, pin, level, &mut self.irq_levels);
    }

    /// Current level of a platform interrupt line.
    pub fn irq_line_level(&self, line: u8) -> bool {
        self.irq_levels
            .level
            .get(usize::from(line))
            .copied()
            .unwrap_or(false)
    }

    /// Drains the pending reset/shutdown requests, oldest first.
    pub fn take_events(&mut self) -> Vec<PlatformEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// System reset: every PCI device returns to its power-on config state
    /// and all interrupt lines drop. Guest RAM is left alone.
    pub fn reset(&mut self) {
        self.pci.borrow_mut().reset();
        self.intx = PciIntxRouter::new();
        self.irq_levels = LineLevels::default();
    }
}
