//! Error types for nvcell operations
//!
//! The error surface is deliberately narrow: a record that fails its CRC or
//! carries the wrong version byte is not an error, it is simply not a record
//! of ours and drops out of the scan. Errors are reserved for backend
//! failures and geometries that cannot hold a single record.

use std::error::Error;
use std::fmt;

/// Which backend primitive failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Read,
    Write,
    Erase,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOp::Read => write!(f, "read"),
            BackendOp::Write => write!(f, "write"),
            BackendOp::Erase => write!(f, "erase"),
        }
    }
}

/// nvcell error types with context for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvError {
    /// No record matching the current version with a valid checksum exists.
    /// A successful `save` clears this condition.
    NoData,

    /// The memory region cannot hold even one record at this payload size,
    /// or a granularity constant is zero.
    Geometry {
        /// Total size of the memory region in bytes
        region_size: u32,
        /// Bytes required for one encoded record (header + payload + CRC)
        record_len: u32,
    },

    /// A backend call reported failure.
    Backend {
        /// The primitive that failed
        op: BackendOp,
        /// Byte offset of the attempted access
        offset: u32,
        /// Length of the attempted access
        len: u32,
    },
}

impl fmt::Display for NvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvError::NoData => write!(f, "no valid record found"),

            NvError::Geometry { region_size, record_len } => {
                write!(
                    f,
                    "region of {} bytes cannot hold a {}-byte record",
                    region_size, record_len
                )
            }

            NvError::Backend { op, offset, len } => {
                write!(f, "backend {} of {} bytes at offset {} failed", op, len, offset)
            }
        }
    }
}

impl Error for NvError {}

/// Result type alias for nvcell operations
pub type NvResult<T> = Result<T, NvError>;
