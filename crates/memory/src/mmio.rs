/// A memory-mapped device frontend.
///
/// `offset` is relative to the base of the region the handler was registered
/// at; `size` is the access width in bytes (1, 2, 4 or 8). Handlers define
/// their own behavior for widths they do not support; returning 0 and
/// dropping the write is the platform convention.
pub trait MmioHandler {
    fn read(&mut self, offset: u64, size: usize) -> u64;
    fn write(&mut self, offset: u64, size: usize, value: u64);
}
