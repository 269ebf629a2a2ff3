//! Memory adapters for the nvcell store
//!
//! Two reference backends for [`nvcell_core::NvMemory`]:
//!
//! - [`RamMemory`]: an in-process buffer with byte granularity. RAM can
//!   overwrite in place, so every in-bounds range is writable and the
//!   store never needs to erase.
//! - [`FileMemory`]: a file padded to the region size with the fill
//!   byte, with erase and write granularities checked the way a flash
//!   part would. Writes and erases are synced to persistent storage
//!   before reporting success, so a value survives process death the
//!   same way it survives power loss on real flash.

pub mod file;
pub mod ram;

pub use file::FileMemory;
pub use ram::RamMemory;
