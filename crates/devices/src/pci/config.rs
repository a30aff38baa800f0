pub const PCI_CONFIG_SPACE_SIZE: usize = 256;

/// PCI configuration space with per-byte write and compare masks.
///
/// The bridge's hardware contract is expressed entirely through masks:
/// - `write_mask` decides which bits a guest config write can change. Each
///   touched byte is updated as `(value & mask) | (old & !mask)`, so a mask of
///   zero makes the byte read-only regardless of access width.
/// - `care_mask` marks the bits that must match a reference snapshot when
///   checking device state for consistency (see [`Self::verify_against`]).
///
/// All multi-byte accesses are little-endian and decompose into independent
/// per-byte operations; a 4-byte write is exactly four 1-byte writes.
pub struct MaskedConfigSpace {
    bytes: [u8; PCI_CONFIG_SPACE_SIZE],
    write_mask: [u8; PCI_CONFIG_SPACE_SIZE],
    care_mask: [u8; PCI_CONFIG_SPACE_SIZE],
}

impl Default for MaskedConfigSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskedConfigSpace {
    pub fn new() -> Self {
        Self {
            bytes: [0; PCI_CONFIG_SPACE_SIZE],
            write_mask: [0; PCI_CONFIG_SPACE_SIZE],
            care_mask: [0; PCI_CONFIG_SPACE_SIZE],
        }
    }

    /// Clears the stored bytes and both masks.
    pub fn clear(&mut self) {
        self.bytes = [0; PCI_CONFIG_SPACE_SIZE];
        self.write_mask = [0; PCI_CONFIG_SPACE_SIZE];
        self.care_mask = [0; PCI_CONFIG_SPACE_SIZE];
    }

    /// Installs a register's reset value and masks.
    ///
    /// This bypasses `write_mask`; it is for device-model initialization, not
    /// guest writes. `size` must be 1, 2 or 4 and the span must stay within
    /// the 256-byte header (programming invariant).
    pub fn set_register(
        &mut self,
        offset: u16,
        size: usize,
        value: u32,
        write_mask: u32,
        care_mask: u32,
    ) {
        assert!(matches!(size, 1 | 2 | 4));
        let offset = usize::from(offset);
        assert!(offset + size <= PCI_CONFIG_SPACE_SIZE);

        for i in 0..size {
            self.bytes[offset + i] = ((value >> (8 * i)) & 0xff) as u8;
            self.write_mask[offset + i] = ((write_mask >> (8 * i)) & 0xff) as u8;
            self.care_mask[offset + i] = ((care_mask >> (8 * i)) & 0xff) as u8;
        }
    }

    pub fn read(&self, offset: u16, size: usize) -> u32 {
        assert!(matches!(size, 1 | 2 | 4));
        let offset = usize::from(offset);
        assert!(offset + size <= PCI_CONFIG_SPACE_SIZE);

        let mut value = 0u32;
        for i in 0..size {
            value |= (self.bytes[offset + i] as u32) << (8 * i);
        }
        value
    }

    pub fn write(&mut self, offset: u16, size: usize, value: u32) {
        assert!(matches!(size, 1 | 2 | 4));
        let offset = usize::from(offset);
        assert!(offset + size <= PCI_CONFIG_SPACE_SIZE);

        for i in 0..size {
            let addr = offset + i;
            let mask = self.write_mask[addr];
            let byte = ((value >> (8 * i)) & 0xff) as u8;
            self.bytes[addr] = (byte & mask) | (self.bytes[addr] & !mask);
        }
    }

    /// Returns a copy of the guest-visible config bytes.
    pub fn snapshot(&self) -> [u8; PCI_CONFIG_SPACE_SIZE] {
        self.bytes
    }

    /// Compares the stored bytes against a reference image under the care
    /// mask. Bits outside the care mask are ignored.
    pub fn verify_against(&self, reference: &[u8; PCI_CONFIG_SPACE_SIZE]) -> bool {
        self.bytes
            .iter()
            .zip(reference.iter())
            .zip(self.care_mask.iter())
            .all(|((byte, want), care)| (byte ^ want) & care == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reads_assemble_little_endian() {
        let mut cfg = MaskedConfigSpace::new();
        cfg.set_register(0x00, 4, 0x1122_3344, 0, 0);

        assert_eq!(cfg.read(0x00, 4), 0x1122_3344);
        assert_eq!(cfg.read(0x00, 2), 0x3344);
        assert_eq!(cfg.read(0x02, 2), 0x1122);
        assert_eq!(cfg.read(0x00, 1), 0x44);
        assert_eq!(cfg.read(0x03, 1), 0x11);
    }

    #[test]
    fn zero_write_mask_makes_bytes_read_only() {
        let mut cfg = MaskedConfigSpace::new();
        cfg.set_register(0x10, 4, 0xaabb_ccdd, 0x0000_0000, 0);

        cfg.write(0x10, 4, 0xffff_ffff);
        assert_eq!(cfg.read(0x10, 4), 0xaabb_ccdd);

        cfg.write(0x12, 1, 0x00);
        assert_eq!(cfg.read(0x10, 4), 0xaabb_ccdd);
    }

    #[test]
    fn partial_write_mask_merges_bits() {
        let mut cfg = MaskedConfigSpace::new();
        cfg.set_register(0x40, 1, 0b1010_0101, 0b0000_1111, 0);

        cfg.write(0x40, 1, 0b1111_0000);
        // Low nibble writable (takes 0), high nibble sticks.
        assert_eq!(cfg.read(0x40, 1), 0b1010_0000);

        cfg.write(0x40, 1, 0b0000_1111);
        assert_eq!(cfg.read(0x40, 1), 0b1010_1111);
    }

    #[test]
    fn multi_byte_write_equals_per_byte_writes() {
        let mut a = MaskedConfigSpace::new();
        let mut b = MaskedConfigSpace::new();
        for cfg in [&mut a, &mut b] {
            cfg.set_register(0x20, 4, 0x0102_0304, 0x00ff_ff00, 0);
        }

        a.write(0x20, 4, 0xdead_beef);
        for i in 0..4u16 {
            b.write(0x20 + i, 1, (0xdead_beefu32 >> (8 * i)) & 0xff);
        }

        assert_eq!(a.read(0x20, 4), b.read(0x20, 4));
    }

    #[test]
    fn verify_against_ignores_bits_outside_care_mask() {
        let mut cfg = MaskedConfigSpace::new();
        cfg.set_register(0x00, 2, 0x0014, 0x0000, 0xffff);
        cfg.set_register(0x3c, 1, 0x00, 0xff, 0x00);

        let reference = cfg.snapshot();
        assert!(cfg.verify_against(&reference));

        // A writable, don't-care byte may drift without failing verification.
        cfg.write(0x3c, 1, 0x0a);
        assert!(cfg.verify_against(&reference));

        // A cared-for byte must not.
        let mut bad = reference;
        bad[0x00] ^= 0x01;
        assert!(!cfg.verify_against(&bad));
    }

    proptest! {
        // Write law: each byte becomes (value & mask) | (old & !mask).
        #[test]
        fn write_law_holds_per_byte(
            old in any::<u8>(),
            mask in any::<u8>(),
            value in any::<u8>(),
        ) {
            let mut cfg = MaskedConfigSpace::new();
            cfg.set_register(0x50, 1, u32::from(old), u32::from(mask), 0);
            cfg.write(0x50, 1, u32::from(value));
            prop_assert_eq!(cfg.read(0x50, 1) as u8, (value & mask) | (old & !mask));
        }

        // A zero mask means no sequence of writes can change the byte.
        #[test]
        fn zero_mask_never_changes(old in any::<u8>(), writes in proptest::collection::vec(any::<u8>(), 0..8)) {
            let mut cfg = MaskedConfigSpace::new();
            cfg.set_register(0x60, 1, u32::from(old), 0, 0);
            for w in writes {
                cfg.write(0x60, 1, u32::from(w));
            }
            prop_assert_eq!(cfg.read(0x60, 1) as u8, old);
        }
    }
}
