//! Guest physical memory storage and the MMIO handler seam.
//!
//! Device models and the platform crate only ever see the [`GuestMemory`] and
//! [`MmioHandler`] traits; the concrete backends live here so tests can pick
//! whichever allocation strategy suits them.

pub mod mmio;
pub mod phys;

pub use mmio::MmioHandler;
pub use phys::{DenseMemory, GuestMemory, GuestMemoryError, GuestMemoryResult, SparseMemory};
