#![forbid(unsafe_code)]

pub mod irq;
pub mod pci;
pub mod pm;

pub use pm::{PmCallbacks, PmController};
