//! PROM argument staging.
//!
//! The kernel is entered with `a0 = argc`, `a1` pointing at the argument
//! area and `a2` pointing at the boot-information tables. The argument area
//! sits at the head of the parameter region: four 32-bit pointer slots, then
//! the argument strings, then (32-byte aligned) the table blob.

use crate::bootinfo::{BOOT_PARAMS_PHYS_ADDR, BOOT_PARAMS_VIRT_ADDR};

/// 64-bit cached virtual alias of physical address zero.
const KSEG0_BASE: u64 = 0xffff_ffff_8000_0000;

/// The argument strings share the first 256 bytes of the region with the
/// pointer slots; longer command lines are truncated.
const ARG_AREA_SIZE: usize = 256;

const POINTER_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromInitrd {
    pub phys_addr: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PromConfig {
    pub kernel_cmdline: String,
    pub initrd: Option<PromInitrd>,
    pub ram_bytes: u64,
}

/// Register values handed to the kernel entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelArgs {
    pub a0: u64,
    pub a1: u64,
    pub a2: u64,
}

pub struct PromArgs {
    bytes: Vec<u8>,
    boot_params_offset: usize,
    kernel_args: KernelArgs,
    memsize_mib: u64,
    highmemsize_mib: u64,
}

impl PromArgs {
    pub fn build(config: &PromConfig) -> Self {
        let mut bytes = vec![0u8; ARG_AREA_SIZE];
        let mut cursor = POINTER_SLOTS * 4;

        let put_slot = |bytes: &mut [u8], slot: usize, value: u32| {
            bytes[slot * 4..slot * 4 + 4].copy_from_slice(&value.to_le_bytes());
        };
        let put_str = |bytes: &mut [u8], cursor: &mut usize, s: &str| {
            let avail = ARG_AREA_SIZE - 1 - *cursor;
            let data = &s.as_bytes()[..s.len().min(avail)];
            bytes[*cursor..*cursor + data.len()].copy_from_slice(data);
            *cursor += data.len() + 1; // NUL terminator
        };

        // argv[0]
        put_slot(&mut bytes, 0, BOOT_PARAMS_VIRT_ADDR + cursor as u32);
        put_str(&mut bytes, &mut cursor, "g");

        // argv[1]: the command line, with the initrd location prepended.
        put_slot(&mut bytes, 1, BOOT_PARAMS_VIRT_ADDR + cursor as u32);
        let cmdline = match config.initrd {
            Some(initrd) => format!(
                "rd_start=0x{:x} rd_size={} {}",
                KSEG0_BASE | u64::from(initrd.phys_addr as u32),
                initrd.size,
                config.kernel_cmdline
            ),
            None => config.kernel_cmdline.clone(),
        };
        put_str(&mut bytes, &mut cursor, &cmdline);

        // Environment pointer slot, kept for layout compatibility; the
        // environment itself is empty.
        put_slot(
            &mut bytes,
            2,
            BOOT_PARAMS_VIRT_ADDR.wrapping_add((4 * cursor) as u32),
        );

        // The table blob follows at the next 32-byte boundary (with a full
        // padding block, matching the firmware this replaces).
        let boot_params_offset = (cursor + 32) & !31;
        bytes.truncate(boot_params_offset);

        let memsize_mib = if config.ram_bytes > 0x1000_0000 {
            256
        } else {
            config.ram_bytes >> 20
        };
        let highmemsize_mib = if config.ram_bytes > 0x1000_0000 {
            (config.ram_bytes >> 20) - 256
        } else {
            0
        };

        Self {
            bytes,
            boot_params_offset,
            kernel_args: KernelArgs {
                a0: 2,
                a1: KSEG0_BASE + BOOT_PARAMS_PHYS_ADDR,
                a2: KSEG0_BASE + BOOT_PARAMS_PHYS_ADDR + boot_params_offset as u64,
            },
            memsize_mib,
            highmemsize_mib,
        }
    }

    /// The staged argument area (pointer slots + strings + padding).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Region-relative offset at which the boot-information blob must be
    /// placed.
    pub fn boot_params_offset(&self) -> usize {
        self.boot_params_offset
    }

    pub fn kernel_args(&self) -> KernelArgs {
        self.kernel_args
    }

    /// RAM below the I/O hole, in MiB.
    pub fn memsize_mib(&self) -> u64 {
        self.memsize_mib
    }

    /// RAM above the hole, in MiB.
    pub fn highmemsize_mib(&self) -> u64 {
        self.highmemsize_mib
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(args: &PromArgs, index: usize) -> u32 {
        u32::from_le_bytes(args.bytes()[index * 4..index * 4 + 4].try_into().unwrap())
    }

    fn cstr_at(args: &PromArgs, offset: usize) -> &str {
        let tail = &args.bytes()[offset..];
        let len = tail.iter().position(|&b| b == 0).unwrap();
        core::str::from_utf8(&tail[..len]).unwrap()
    }

    #[test]
    fn argv_layout_matches_the_pointer_slots() {
        let args = PromArgs::build(&PromConfig {
            kernel_cmdline: "console=ttyS0 root=/dev/ram".into(),
            initrd: None,
            ram_bytes: 512 << 20,
        });

        let argv0 = slot(&args, 0);
        let argv1 = slot(&args, 1);
        assert_eq!(argv0, 0x8ff0_0010);
        assert_eq!(cstr_at(&args, (argv0 - 0x8ff0_0000) as usize), "g");
        assert_eq!(
            cstr_at(&args, (argv1 - 0x8ff0_0000) as usize),
            "console=ttyS0 root=/dev/ram"
        );
        // Terminator slot stays zero.
        assert_eq!(slot(&args, 3), 0);
    }

    #[test]
    fn initrd_location_is_prepended_to_the_command_line() {
        let args = PromArgs::build(&PromConfig {
            kernel_cmdline: "console=ttyS0".into(),
            initrd: Some(PromInitrd {
                phys_addr: 0x0400_0000,
                size: 8 << 20,
            }),
            ram_bytes: 512 << 20,
        });

        let argv1 = slot(&args, 1);
        assert_eq!(
            cstr_at(&args, (argv1 - 0x8ff0_0000) as usize),
            "rd_start=0xffffffff84000000 rd_size=8388608 console=ttyS0"
        );
    }

    #[test]
    fn boot_params_follow_the_strings_32_byte_aligned() {
        let args = PromArgs::build(&PromConfig {
            kernel_cmdline: "x".into(),
            initrd: None,
            ram_bytes: 512 << 20,
        });

        // slots (16) + "g\0" (2) + "x\0" (2) = 20, padded into the next
        // 32-byte block.
        assert_eq!(args.boot_params_offset(), 32);
        assert_eq!(args.bytes().len(), 32);

        let ka = args.kernel_args();
        assert_eq!(ka.a0, 2);
        assert_eq!(ka.a1, 0xffff_ffff_8ff0_0000);
        assert_eq!(ka.a2, 0xffff_ffff_8ff0_0020);
    }

    #[test]
    fn memory_split_follows_the_hole() {
        let args = PromArgs::build(&PromConfig {
            ram_bytes: 512 << 20,
            ..Default::default()
        });
        assert_eq!(args.memsize_mib(), 256);
        assert_eq!(args.highmemsize_mib(), 256);

        let args = PromArgs::build(&PromConfig {
            ram_bytes: 128 << 20,
            ..Default::default()
        });
        assert_eq!(args.memsize_mib(), 128);
        assert_eq!(args.highmemsize_mib(), 0);
    }
}
