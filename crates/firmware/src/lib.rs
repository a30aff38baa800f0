#![forbid(unsafe_code)]

//! Firmware staging for the machine.
//!
//! The kernel discovers its environment through a parameter region the
//! firmware leaves in low RAM: a PROM argument area followed by the
//! boot-information tables (memory map, cpu info, interrupt routing and so
//! on). This crate builds both as plain byte blobs and installs them through
//! the guest-memory seam.

pub mod bootinfo;
pub mod host;
pub mod prom;

pub use bootinfo::{BootInfoBlob, BootInfoConfig, BootInfoError};
pub use prom::{KernelArgs, PromArgs, PromConfig, PromInitrd};
