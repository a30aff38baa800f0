use std::collections::HashMap;

use crate::irq::IrqLineSink;

/// Platform interrupt lines the bridge can drive, in swizzle order.
pub const PCI_IRQ_LINES: [u8; 8] = [3, 4, 5, 6, 7, 9, 10, 11];

/// Returns the platform line a slot/pin pair is wired to.
///
/// The swizzle is `lines[(pin + slot) mod 8]`; it is total for any slot/pin
/// and periodic in both arguments with period 8.
pub fn route_intx(slot: u8, pin: u8) -> u8 {
    PCI_IRQ_LINES[(usize::from(pin) + usize::from(slot)) % PCI_IRQ_LINES.len()]
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct IntxSource {
    slot: u8,
    pin: u8,
}

/// Routes per-slot INTx pins to the platform interrupt lines.
///
/// Several slot/pin pairs share a line, so the router keeps level-triggered
/// semantics by reference-counting assertions: the line goes high on the
/// first asserting source and low only when the last one deasserts.
#[derive(Default)]
pub struct PciIntxRouter {
    source_level: HashMap<IntxSource, bool>,
    line_assert_count: HashMap<u8, u32>,
}

impl PciIntxRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the asserted level of a slot's INTx pin.
    pub fn set_intx_level(&mut self, slot: u8, pin: u8, level: bool, sink: &mut dyn IrqLineSink) {
        let src = IntxSource { slot, pin };
        let prev = self.source_level.insert(src, level).unwrap_or(false);
        if prev == level {
            return;
        }

        let line = route_intx(slot, pin);
        let count = self.line_assert_count.entry(line).or_insert(0);

        if level {
            *count += 1;
            if *count == 1 {
                sink.set_irq_level(line, true);
            }
        } else {
            debug_assert!(*count > 0, "INTx deassert would underflow assert count");
            if *count > 0 {
                *count -= 1;
                if *count == 0 {
                    sink.set_irq_level(line, false);
                }
            }
        }
    }

    pub fn assert_intx(&mut self, slot: u8, pin: u8, sink: &mut dyn IrqLineSink) {
        self.set_intx_level(slot, pin, true, sink);
    }

    pub fn deassert_intx(&mut self, slot: u8, pin: u8, sink: &mut dyn IrqLineSink) {
        self.set_intx_level(slot, pin, false, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct MockSink {
        events: Vec<(u8, bool)>,
    }

    impl IrqLineSink for MockSink {
        fn set_irq_level(&mut self, line: u8, level: bool) {
            self.events.push((line, level));
        }
    }

    #[test]
    fn routing_walks_the_line_table() {
        // Slot 0: pins map straight onto the table.
        assert_eq!(route_intx(0, 0), 3);
        assert_eq!(route_intx(0, 1), 4);
        assert_eq!(route_intx(0, 7), 11);

        // Slot advances the starting position.
        assert_eq!(route_intx(1, 0), 4);
        assert_eq!(route_intx(5, 0), 9);
        assert_eq!(route_intx(7, 1), 3);
    }

    #[test]
    fn shared_line_stays_asserted_until_all_sources_deassert() {
        let mut router = PciIntxRouter::new();
        let mut sink = MockSink::default();

        // Slot 0 pin 2 and slot 2 pin 0 both land on line 5.
        assert_eq!(route_intx(0, 2), route_intx(2, 0));

        router.assert_intx(0, 2, &mut sink);
        router.assert_intx(2, 0, &mut sink);
        assert_eq!(sink.events, vec![(5, true)]);

        // Re-asserting an already-high source is a no-op.
        router.assert_intx(0, 2, &mut sink);
        assert_eq!(sink.events, vec![(5, true)]);

        router.deassert_intx(0, 2, &mut sink);
        assert_eq!(sink.events, vec![(5, true)]);

        router.deassert_intx(2, 0, &mut sink);
        assert_eq!(sink.events, vec![(5, true), (5, false)]);
    }

    proptest! {
        // Every route lands on one of the eight bridge lines.
        #[test]
        fn route_is_total_and_in_range(slot in 0u8..16, pin in 0u8..8) {
            let line = route_intx(slot, pin);
            prop_assert!(PCI_IRQ_LINES.contains(&line));
        }

        // The swizzle is periodic in the slot with period 8.
        #[test]
        fn route_is_periodic_in_slot(slot in 0u8..8, pin in 0u8..8) {
            prop_assert_eq!(route_intx(slot, pin), route_intx(slot + 8, pin));
        }
    }
}
