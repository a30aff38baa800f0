//! Guest physical RAM backends.
//!
//! Two interchangeable backends sit behind the [`GuestMemory`] trait: a
//! dense one for small scratch regions, and a sparse one for the machine's
//! RAM, where most of a multi-hundred-MiB guest is never touched and chunks
//! materialize on first write.

use core::fmt;

/// Errors from the guest physical RAM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestMemoryError {
    /// The span `[paddr, paddr + len)` falls outside guest RAM.
    OutOfRange { paddr: u64, len: usize, size: u64 },
    /// The requested RAM size cannot be represented on this host.
    SizeTooLarge { size: u64 },
    /// Sparse backing needs a non-zero chunk size.
    InvalidChunkSize { chunk_size: usize },
}

impl fmt::Display for GuestMemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestMemoryError::OutOfRange { paddr, len, size } => write!(
                f,
                "access of {len} bytes at {paddr:#x} exceeds guest RAM of {size:#x} bytes"
            ),
            GuestMemoryError::SizeTooLarge { size } => {
                write!(f, "guest RAM size {size:#x} does not fit the host address space")
            }
            GuestMemoryError::InvalidChunkSize { chunk_size } => {
                write!(f, "sparse chunk size must be non-zero, got {chunk_size}")
            }
        }
    }
}

impl std::error::Error for GuestMemoryError {}

pub type GuestMemoryResult<T> = Result<T, GuestMemoryError>;

/// Byte-addressed guest physical RAM.
///
/// The firmware crate installs its staged blobs through this seam; the
/// platform and its tests read the installed tables back through the
/// little-endian accessors. Device models never touch RAM directly.
pub trait GuestMemory {
    /// Total guest RAM in bytes.
    fn size(&self) -> u64;

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()>;

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()>;

    fn read_u16_le(&self, paddr: u64) -> GuestMemoryResult<u16> {
        let mut buf = [0u8; 2];
        self.read_into(paddr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&self, paddr: u64) -> GuestMemoryResult<u32> {
        let mut buf = [0u8; 4];
        self.read_into(paddr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&self, paddr: u64) -> GuestMemoryResult<u64> {
        let mut buf = [0u8; 8];
        self.read_into(paddr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// Validates `[paddr, paddr + len)` against the backend size without any
/// overflowing arithmetic.
fn check_span(size: u64, paddr: u64, len: usize) -> GuestMemoryResult<()> {
    if paddr > size || len as u64 > size - paddr.min(size) {
        return Err(GuestMemoryError::OutOfRange { paddr, len, size });
    }
    Ok(())
}

/// Contiguous backend; the whole region is allocated up front.
pub struct DenseMemory {
    bytes: Box<[u8]>,
}

impl DenseMemory {
    pub fn new(size: u64) -> GuestMemoryResult<Self> {
        let len = usize::try_from(size).map_err(|_| GuestMemoryError::SizeTooLarge { size })?;
        Ok(Self {
            bytes: vec![0u8; len].into_boxed_slice(),
        })
    }
}

impl GuestMemory for DenseMemory {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        check_span(self.size(), paddr, dst.len())?;
        let start = paddr as usize;
        dst.copy_from_slice(&self.bytes[start..start + dst.len()]);
        Ok(())
    }

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        check_span(self.size(), paddr, src.len())?;
        let start = paddr as usize;
        self.bytes[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }
}

/// Chunked backend for the machine's RAM.
///
/// Chunks materialize on first write; reads of untouched chunks return
/// zeroes, so an idle 512 MiB guest costs little more than the chunk table.
pub struct SparseMemory {
    size: u64,
    chunk_size: usize,
    chunks: Vec<Option<Box<[u8]>>>,
}

impl SparseMemory {
    pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

    pub fn new(size: u64) -> GuestMemoryResult<Self> {
        Self::with_chunk_size(size, Self::DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(size: u64, chunk_size: usize) -> GuestMemoryResult<Self> {
        if chunk_size == 0 {
            return Err(GuestMemoryError::InvalidChunkSize { chunk_size });
        }
        let count = usize::try_from(size.div_ceil(chunk_size as u64))
            .map_err(|_| GuestMemoryError::SizeTooLarge { size })?;
        Ok(Self {
            size,
            chunk_size,
            chunks: vec![None; count],
        })
    }

    /// Number of chunks that have been materialized so far.
    pub fn allocated_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }
}

impl GuestMemory for SparseMemory {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_into(&self, paddr: u64, dst: &mut [u8]) -> GuestMemoryResult<()> {
        check_span(self.size, paddr, dst.len())?;
        let chunk_size = self.chunk_size as u64;
        let mut pos = 0;
        while pos < dst.len() {
            let addr = paddr + pos as u64;
            let index = (addr / chunk_size) as usize;
            let offset = (addr % chunk_size) as usize;
            let take = (self.chunk_size - offset).min(dst.len() - pos);
            match &self.chunks[index] {
                Some(chunk) => dst[pos..pos + take].copy_from_slice(&chunk[offset..offset + take]),
                None => dst[pos..pos + take].fill(0),
            }
            pos += take;
        }
        Ok(())
    }

    fn write_from(&mut self, paddr: u64, src: &[u8]) -> GuestMemoryResult<()> {
        check_span(self.size, paddr, src.len())?;
        let chunk_size = self.chunk_size as u64;
        let full_chunk = self.chunk_size;
        let mut pos = 0;
        while pos < src.len() {
            let addr = paddr + pos as u64;
            let index = (addr / chunk_size) as usize;
            let offset = (addr % chunk_size) as usize;
            let take = (full_chunk - offset).min(src.len() - pos);
            let chunk = self.chunks[index]
                .get_or_insert_with(|| vec![0u8; full_chunk].into_boxed_slice());
            chunk[offset..offset + take].copy_from_slice(&src[pos..pos + take]);
            pos += take;
        }
        Ok(())
    }
}
