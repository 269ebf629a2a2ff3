//! Region geometry: how many records fit, and where
//!
//! The region is carved into equal blocks. Each block starts at a
//! stride-aligned offset, so every block start is simultaneously
//! erase-aligned and write-aligned. The stride is the encoded record
//! length rounded up to the least common multiple of the two
//! granularities; whatever the rounding adds is padding that stays at the
//! fill value.

use crate::error::{NvError, NvResult};
use crate::format;
use crate::memory::NvMemory;

/// Block layout derived from a region's constants and the payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Distance in bytes between the starts of successive blocks.
    pub stride: u32,
    /// Number of blocks the region holds.
    pub count: u32,
    /// Encoded record length: version byte + sequence + payload + CRC.
    pub record_len: u32,
    /// Record length rounded up to the write granularity; the span a
    /// single programming pass covers.
    pub write_len: u32,
}

impl Geometry {
    /// Layout for memory type `M` holding `payload_len`-byte payloads.
    pub fn new<M: NvMemory>(payload_len: u32) -> NvResult<Self> {
        Self::compute(M::SIZE, M::ERASE_GRANULARITY, M::WRITE_GRANULARITY, payload_len)
    }

    /// Layout from raw constants. Errors when the region cannot hold a
    /// single block or a granularity is zero.
    pub fn compute(size: u32, erase: u32, write: u32, payload_len: u32) -> NvResult<Self> {
        let record_len = format::record_len(payload_len as usize) as u64;

        if erase == 0 || write == 0 {
            return Err(NvError::Geometry { region_size: size, record_len: record_len as u32 });
        }

        let align = lcm(erase as u64, write as u64);
        let stride = record_len.div_ceil(align) * align;

        if stride == 0 || stride > size as u64 {
            return Err(NvError::Geometry {
                region_size: size,
                record_len: record_len.min(u32::MAX as u64) as u32,
            });
        }

        let write_len = record_len.div_ceil(write as u64) * write as u64;

        Ok(Self {
            stride: stride as u32,
            count: size / stride as u32,
            record_len: record_len as u32,
            write_len: write_len as u32,
        })
    }

    /// Byte offset of block `index`.
    pub fn offset(&self, index: u32) -> u32 {
        index * self.stride
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}
