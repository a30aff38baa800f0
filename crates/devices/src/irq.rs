/// A sink that accepts level changes for a platform interrupt line.
///
/// Interrupt lines are identified by the number the firmware routing tables
/// report to the guest (the bridge drives lines 3-11).
pub trait IrqLineSink {
    fn set_irq_level(&mut self, line: u8, level: bool);
}
