//! Boot-information tables.
//!
//! The kernel expects a `boot_params` header in low RAM whose embedded
//! parameter block records byte offsets to seven sub-tables (memory map, cpu
//! info, system description, interrupt routing, interface info, board
//! devices, special attributes). Offsets are relative to the parameter block
//! itself and every sub-table starts on a 64-byte boundary.
//!
//! The builder serializes the whole region into an owned byte blob with
//! explicit field offsets; the blob is then installed into guest RAM in one
//! write.

use core::fmt;

use memory::{GuestMemory, GuestMemoryResult};

/// Physical load address of the firmware parameter region.
pub const BOOT_PARAMS_PHYS_ADDR: u64 = 0x0ff0_0000;
/// The same region through the 32-bit cached virtual window.
pub const BOOT_PARAMS_VIRT_ADDR: u32 = 0x8ff0_0000;
/// Size reserved for the whole parameter region (PROM area + tables).
pub const PARAMS_REGION_SIZE: usize = 0x10_0000;

const TABLE_ALIGN: usize = 64;

const fn align_up(x: usize) -> usize {
    (x + TABLE_ALIGN - 1) & !(TABLE_ALIGN - 1)
}

// `boot_params` header layout (natural C alignment, 152 bytes).
const HEADER_SIZE: usize = 152;
const SMBIOS_VERS: usize = 24;
const PARAMS_BLOCK: usize = 40;
// u64 offset fields within the parameter block.
const MEMORY_OFFSET: usize = PARAMS_BLOCK;
const CPU_OFFSET: usize = PARAMS_BLOCK + 8;
const SYSTEM_OFFSET: usize = PARAMS_BLOCK + 16;
const IRQ_OFFSET: usize = PARAMS_BLOCK + 24;
const INTERFACE_OFFSET: usize = PARAMS_BLOCK + 32;
const SPECIAL_OFFSET: usize = PARAMS_BLOCK + 40;
const BOARDDEV_OFFSET: usize = PARAMS_BLOCK + 48;
// Reset-system callback block.
const RESET_COLD: usize = 112;
const RESET_WARM: usize = 120;
const RESET_SHUTDOWN: usize = 136;

// Entry points in the boot ROM's reset/shutdown stubs.
const RESET_VECTOR: u64 = 0xffff_ffff_bfc0_0088;
const SHUTDOWN_VECTOR: u64 = 0xffff_ffff_bfc0_00b0;

// Sub-table byte sizes (packed C layouts unless noted).
const MEMMAP_SIZE: usize = 10 + 128 * 20;
const CPUINFO_SIZE: usize = 26 + 64;
const SYSTEM_SIZE: usize = 9076;
const IRQ_ROUTING_SIZE: usize = 84;
const INTERFACE_SIZE: usize = 69;
const BOARD_DEVICES_SIZE: usize = 72 + 128 * 88; // natural alignment
const SPECIAL_SIZE: usize = 72 + 128 * 88; // natural alignment

const MEM_FREQ_HZ: u32 = 300_000_000;
const CPU_CLOCK_FALLBACK_HZ: u32 = 400_000_000;
const CPUTYPE_LOONGSON_3A: u32 = 0x300;
const PROCESSOR_ID: u32 = 0x14c000;
const HIGH_RAM_START: u64 = 0x9000_0000;

const PCI_MEM_START: u64 = 0x4000_0000;
const PCI_MEM_END: u64 = 0x7fff_ffff;
const PCI_IO_START: u64 = 0x1800_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootInfoError {
    /// The parameter region cannot hold the tables.
    ScratchTooSmall { required: usize, capacity: usize },
}

impl fmt::Display for BootInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootInfoError::ScratchTooSmall { required, capacity } => write!(
                f,
                "boot-info tables need {required} bytes but only {capacity} are reserved"
            ),
        }
    }
}

impl std::error::Error for BootInfoError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootInfoConfig {
    pub ram_bytes: u64,
    pub cpu_count: u32,
    /// Reported CPU clock. Zero selects the 400 MHz fallback.
    pub cpu_clock_hz: u32,
}

/// Blob-relative start of each sub-table, in placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOffsets {
    pub memory: usize,
    pub cpu: usize,
    pub system: usize,
    pub irq: usize,
    pub interface: usize,
    pub boarddev: usize,
    pub special: usize,
}

#[derive(Debug)]
pub struct BootInfoBlob {
    bytes: Vec<u8>,
    tables: TableOffsets,
}

impl BootInfoBlob {
    /// Builds the full parameter blob.
    ///
    /// `capacity` is the space available for the blob inside the reserved
    /// parameter region; the fixed table layout either fits or the machine
    /// cannot boot.
    pub fn build(config: &BootInfoConfig, capacity: usize) -> Result<Self, BootInfoError> {
        let mut cursor = align_up(HEADER_SIZE);
        let mut place = |size: usize| {
            let at = cursor;
            cursor += align_up(size);
            at
        };

        let tables = TableOffsets {
            memory: place(MEMMAP_SIZE),
            cpu: place(CPUINFO_SIZE),
            system: place(SYSTEM_SIZE),
            irq: place(IRQ_ROUTING_SIZE),
            interface: place(INTERFACE_SIZE),
            boarddev: place(BOARD_DEVICES_SIZE),
            special: place(SPECIAL_SIZE),
        };
        let required = cursor;
        if required > capacity {
            return Err(BootInfoError::ScratchTooSmall { required, capacity });
        }

        let mut blob = Self {
            bytes: vec![0; required],
            tables,
        };
        blob.write_header();
        blob.write_memory_map(config);
        blob.write_cpu_info(config);
        blob.write_system_info();
        blob.write_irq_routing();
        blob.write_interface_info();
        blob.write_board_devices();
        blob.write_special_info();
        Ok(blob)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn tables(&self) -> TableOffsets {
        self.tables
    }

    /// Writes the blob into guest memory at `paddr`.
    pub fn install<M: GuestMemory>(&self, mem: &mut M, paddr: u64) -> GuestMemoryResult<()> {
        mem.write_from(paddr, &self.bytes)
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u64(&mut self, offset: usize, value: u64) {
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn put_str(&mut self, offset: usize, max: usize, s: &str) {
        let bytes = s.as_bytes();
        debug_assert!(bytes.len() < max, "string field overflow");
        let len = bytes.len().min(max - 1);
        self.bytes[offset..offset + len].copy_from_slice(&bytes[..len]);
    }

    fn write_header(&mut self) {
        self.put_u16(SMBIOS_VERS, 1);

        // Sub-table offsets are recorded relative to the parameter block, not
        // to the start of the blob.
        let rel = |at: usize| (at - PARAMS_BLOCK) as u64;
        let tables = self.tables;
        self.put_u64(MEMORY_OFFSET, rel(tables.memory));
        self.put_u64(CPU_OFFSET, rel(tables.cpu));
        self.put_u64(SYSTEM_OFFSET, rel(tables.system));
        self.put_u64(IRQ_OFFSET, rel(tables.irq));
        self.put_u64(INTERFACE_OFFSET, rel(tables.interface));
        self.put_u64(SPECIAL_OFFSET, rel(tables.special));
        self.put_u64(BOARDDEV_OFFSET, rel(tables.boarddev));

        self.put_u64(RESET_COLD, RESET_VECTOR);
        self.put_u64(RESET_WARM, RESET_VECTOR);
        self.put_u64(RESET_SHUTDOWN, SHUTDOWN_VECTOR);
    }

    // Memory map: vers u16, nr_map u32 @2, mem_freq u32 @6, then entries of
    // {node_id u32, mem_type u32, mem_start u64, mem_size u32} (packed, 20
    // bytes each). Sizes are in MiB.
    fn write_memory_map(&mut self, config: &BootInfoConfig) {
        let base = self.tables.memory;
        let ram_mib = config.ram_bytes >> 20;

        self.put_u32(base + 2, 2); // nr_map
        self.put_u32(base + 6, MEM_FREQ_HZ);

        // Low RAM below the I/O hole; the first 16 MiB belong to firmware.
        let low_mib = if config.ram_bytes > 0x1000_0000 {
            256
        } else {
            ram_mib
        } - 16;
        let entry0 = base + 10;
        self.put_u32(entry0, 0); // node_id
        self.put_u32(entry0 + 4, 1); // mem_type: low RAM
        self.put_u64(entry0 + 8, 0);
        self.put_u32(entry0 + 16, low_mib as u32);

        // Everything past 256 MiB reappears above the hole.
        let high_mib = if config.ram_bytes > 0x1000_0000 {
            ram_mib - 256
        } else {
            0
        };
        let entry1 = entry0 + 20;
        self.put_u32(entry1, 0);
        self.put_u32(entry1 + 4, 2); // mem_type: high RAM
        self.put_u64(entry1 + 8, HIGH_RAM_START);
        self.put_u32(entry1 + 16, high_mib as u32);
    }

    // Cpu info: vers u16, processor_id u32 @2, cputype u32 @6, total_node u32
    // @10, boot core u16 @14, reserved mask u16 @16, clock u32 @18, nr_cpus
    // u32 @22, name bytes @26.
    fn write_cpu_info(&mut self, config: &BootInfoConfig) {
        let base = self.tables.cpu;
        let clock = if config.cpu_clock_hz != 0 {
            config.cpu_clock_hz
        } else {
            CPU_CLOCK_FALLBACK_HZ
        };

        self.put_u32(base + 2, PROCESSOR_ID);
        self.put_u32(base + 6, CPUTYPE_LOONGSON_3A);
        self.put_u32(base + 10, (config.cpu_count + 3) / 4); // total_node
        self.put_u16(base + 14, 0); // boot core id
        self.put_u32(base + 18, clock);
        self.put_u32(base + 22, config.cpu_count);
    }

    // System description: uart/sensor tables plus EC/TCM fields, almost all
    // of which stay zero on this board.
    fn write_system_info(&mut self) {
        let base = self.tables.system;

        self.put_u32(base + 2, 0); // ccnuma_smp
        self.put_u32(base + 6, 1); // sing_double_channel
        self.put_u32(base + 10, 1); // nr_uarts

        // uart[0]: {iotype u32, uartclk u32, int_offset u32, uart_base u64},
        // packed, 20 bytes per slot.
        let uart0 = base + 14;
        self.put_u32(uart0, 2); // iotype
        self.put_u32(uart0 + 4, 25_000_000); // uartclk
        self.put_u32(uart0 + 8, 2); // int_offset
        self.put_u64(uart0 + 12, 0x1fe0_01e0); // uart_base

        self.put_u32(base + 1294, 0); // nr_sensors
    }

    // Interrupt routing: only the PCI windows and DMA width are populated.
    fn write_irq_routing(&mut self) {
        let base = self.tables.irq;

        self.put_u32(base + 16, 0); // PIC_type
        self.put_u32(base + 36, 0); // node_id
        self.put_u64(base + 40, PCI_MEM_START);
        self.put_u64(base + 48, PCI_MEM_END);
        self.put_u64(base + 56, PCI_IO_START);
        self.put_u16(base + 80, 64); // dma_mask_bits
    }

    // Interface info: vers u16, size u16 @2, flag u8 @4, description @5.
    fn write_interface_info(&mut self) {
        let base = self.tables.interface;
        self.put_u16(base, 0x01);
        self.put_str(base + 5, 64, "UEFI_Version_v1.0");
    }

    // Board devices (natural alignment): name @0, num_resources u32 @64,
    // resource slots @72.
    fn write_board_devices(&mut self) {
        let base = self.tables.boarddev;
        self.put_str(base, 64, "Loongson-3A-VIRT-1w-V1.00-demo");
    }

    // Special attributes (natural alignment): vers u16, name @2, type u32
    // @68, resource slots @72.
    fn write_special_info(&mut self) {
        let base = self.tables.special;
        self.put_str(base + 2, 64, "2014-09-11");
    }
}
