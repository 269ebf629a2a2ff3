//! Backend trait for raw nonvolatile memory
//!
//! A backend models any medium with erase-before-write semantics: NOR
//! flash, EEPROM, battery-backed RAM, or a plain file standing in for one.
//! The store is generic over this trait and owns its region exclusively
//! through a `&mut` borrow for its whole lifetime.
//!
//! Methods return a success flag rather than a rich error; the store maps
//! `false` into [`NvError::Backend`](crate::NvError::Backend) with the
//! offset and length attached.

/// Raw memory region with configurable erase and write granularities.
pub trait NvMemory {
    /// Total region size in bytes.
    const SIZE: u32;

    /// Smallest unit the medium can clear to [`Self::FILL_BYTE`].
    const ERASE_GRANULARITY: u32;

    /// Smallest unit the medium can program.
    const WRITE_GRANULARITY: u32;

    /// Byte value a freshly erased medium presents, typically `0xFF`.
    const FILL_BYTE: u8 = 0xFF;

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    /// Fails when the range exceeds the region.
    fn read(&mut self, offset: u32, dst: &mut [u8]) -> bool;

    /// `true` iff `offset` and `len` are multiples of the write
    /// granularity, the range is in bounds, and every byte in the range
    /// still holds the fill byte.
    fn writable(&mut self, offset: u32, len: u32) -> bool;

    /// Program `src` at `offset`. The caller must have observed a
    /// successful [`writable`](Self::writable) for the range; programming
    /// over a non-fill byte is undefined on real flash.
    fn write(&mut self, offset: u32, src: &[u8]) -> bool;

    /// Reset `len` bytes at `offset` to the fill byte. Fails unless both
    /// are multiples of the erase granularity and the range is in bounds.
    fn erase(&mut self, offset: u32, len: u32) -> bool;
}
