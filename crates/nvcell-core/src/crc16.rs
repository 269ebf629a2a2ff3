//! CRC-16/IBM-3740 engine
//!
//! Parameters: width=16, poly=0x1021, init=0xFFFF, refin=false,
//! refout=false, xorout=0x0000, check=0x29B1. This is the variant every
//! record trailer carries, so the table below is part of the persisted
//! format, not an implementation detail.
//!
//! The register is exposed so callers can continue a checksum across
//! several buffers: `process` folds bytes into the register and returns
//! its new value, and `crc(s, a ++ b) == crc(crc(s, a), b)` holds.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// 256-entry lookup table, one shift-ahead step per byte.
const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Stateful CRC-16/IBM-3740 register.
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    reg: u16,
}

impl Crc16 {
    /// A fresh register holding the algorithm's initial value.
    pub fn new() -> Self {
        Self { reg: INIT }
    }

    /// Set the register to an arbitrary value, continuing a prior stream.
    pub fn seed(&mut self, seed: u16) {
        self.reg = seed;
    }

    /// Fold `bytes` into the register and return its new value.
    pub fn process(&mut self, bytes: &[u8]) -> u16 {
        for &byte in bytes {
            let index = ((self.reg >> 8) ^ byte as u16) & 0xFF;
            self.reg = (self.reg << 8) ^ TABLE[index as usize];
        }
        self.reg
    }

    /// Current register value without consuming input.
    pub fn value(&self) -> u16 {
        self.reg
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot checksum of `bytes` from the initial register value.
pub fn checksum(bytes: &[u8]) -> u16 {
    Crc16::new().process(bytes)
}
