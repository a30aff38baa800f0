//! Guest-visible behavior of the bridge windows and the PM block, driven
//! through the machine's physical access path.

use loong_devices::pm::{PM_CONTROL_OFFSET, PM_MMIO_BASE};
use loong_platform::decode::{EXTENDED_CONFIG_BASE, INTERNAL_REG_BASE, LOCAL_CONFIG_BASE};
use loong_platform::{Machine, MachineConfig, PlatformEvent};

fn machine() -> Machine {
    Machine::new(&MachineConfig {
        cpu_clock_hz: Some(1_600_000_000),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn extended_window_reads_the_bridge_identity() {
    let mut m = machine();
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE, 4), 0x7a00_0014);
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE + 2, 2), 0x7a00);
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE, 1), 0x14);
}

#[test]
fn extended_window_mirror_aliases_device_zero() {
    let mut m = machine();
    // With bit 24 set only the low 16 bits of the offset are decoded, so
    // both of these fold back onto 0:00.0 register 0.
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE + 0x0100_0000, 4), 0x7a00_0014);
    assert_eq!(
        m.mmio_read(EXTENDED_CONFIG_BASE + 0x0100_0000 + 0x0078_0000, 4),
        0x7a00_0014
    );
}

#[test]
fn extended_window_reads_all_ones_for_absent_devices() {
    let mut m = machine();
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE + (2 << 11), 4), 0xffff_ffff);
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE + (1 << 16), 2), 0xffff);
    // Writes there are dropped without fault.
    m.mmio_write(EXTENDED_CONFIG_BASE + (3 << 11), 4, 0x1234_5678);
}

#[test]
fn local_window_is_the_bridge_header_dword_only() {
    let mut m = machine();
    assert_eq!(m.mmio_read(LOCAL_CONFIG_BASE, 4), 0x7a00_0014);
    // BAR3 carries its fixed type bits; the other BARs read zero.
    assert_eq!(m.mmio_read(LOCAL_CONFIG_BASE + 0x1c, 4), 0x0000_0004);
    assert_eq!(m.mmio_read(LOCAL_CONFIG_BASE + 0x10, 4), 0);

    // Only dword accesses decode.
    assert_eq!(m.mmio_read(LOCAL_CONFIG_BASE, 2), 0);
    assert_eq!(m.mmio_read(LOCAL_CONFIG_BASE, 1), 0);
}

#[test]
fn bridge_config_space_is_read_only_through_both_windows() {
    let mut m = machine();
    m.mmio_write(LOCAL_CONFIG_BASE + 0x1c, 4, 0xffff_ffff);
    m.mmio_write(EXTENDED_CONFIG_BASE + 0x04, 4, 0xffff_ffff);
    assert_eq!(m.mmio_read(LOCAL_CONFIG_BASE + 0x1c, 4), 0x0000_0004);
    assert_eq!(m.mmio_read(EXTENDED_CONFIG_BASE + 0x04, 4), 0x0010_0000);
}

#[test]
fn internal_registers_read_zero_and_swallow_writes() {
    let mut m = machine();
    assert_eq!(m.mmio_read(INTERNAL_REG_BASE, 4), 0);
    m.mmio_write(INTERNAL_REG_BASE, 4, 0xdead_beef);
    assert_eq!(m.mmio_read(INTERNAL_REG_BASE, 4), 0);

    // Sub-dword and unaligned accesses do not decode.
    assert_eq!(m.mmio_read(INTERNAL_REG_BASE + 8, 2), 0);
    assert_eq!(m.mmio_read(INTERNAL_REG_BASE + 2, 4), 0);
}

#[test]
fn pm_control_writes_raise_platform_events() {
    let mut m = machine();
    assert_eq!(m.take_events(), vec![]);

    m.mmio_write(PM_MMIO_BASE + PM_CONTROL_OFFSET, 1, 0x00);
    m.mmio_write(PM_MMIO_BASE + PM_CONTROL_OFFSET, 1, 0xff);
    assert_eq!(
        m.take_events(),
        vec![PlatformEvent::Reset, PlatformEvent::Shutdown]
    );
    // Drained.
    assert_eq!(m.take_events(), vec![]);

    // Unrecognized commands and reads produce nothing.
    m.mmio_write(PM_MMIO_BASE + PM_CONTROL_OFFSET, 1, 0x42);
    assert_eq!(m.mmio_read(PM_MMIO_BASE + PM_CONTROL_OFFSET, 4), 0);
    assert_eq!(m.take_events(), vec![]);
}

#[test]
fn unclaimed_addresses_read_zero() {
    let mut m = machine();
    assert_eq!(m.mmio_read(0x4000_0000, 4), 0);
    assert_eq!(m.mmio_read(0x1800_0000, 1), 0);
    m.mmio_write(0x4000_0000, 4, 0x5555_5555);
}
