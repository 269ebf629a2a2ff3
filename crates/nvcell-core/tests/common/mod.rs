//! Shared test harness: an instrumented RAM region that enforces real
//! granularity rules and tallies per-byte writes and erases, plus the
//! property checks the geometry grid instantiates.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use nvcell_core::{format, Geometry, NvCell, NvError, NvMemory};

/// Version tag the grid stores use.
pub const VERSION: u8 = 100;

pub type Cell<'m, const S: u32, const E: u32, const W: u32, const P: usize> =
    NvCell<'m, GridMemory<S, E, W>, [u8; P], { VERSION }>;

/// Counters shared between a test and the memory its store has borrowed.
#[derive(Debug, Default)]
pub struct Stats {
    pub write_hist: Vec<u32>,
    pub erase_hist: Vec<u32>,
    pub bytes_written: u64,
    pub erases: u64,
    /// When set, `write` applies only this many more bytes and then
    /// fails, simulating power loss mid-programming.
    pub write_budget: Option<usize>,
}

/// RAM region that behaves like the real part: writes must target erased
/// ranges at write-granularity offsets, erases must cover whole sectors.
pub struct GridMemory<const S: u32, const E: u32, const W: u32> {
    pub mem: Vec<u8>,
    stats: Rc<RefCell<Stats>>,
}

impl<const S: u32, const E: u32, const W: u32> GridMemory<S, E, W> {
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; S as usize],
            stats: Rc::new(RefCell::new(Stats {
                write_hist: vec![0; S as usize],
                erase_hist: vec![0; S as usize],
                ..Stats::default()
            })),
        }
    }

    /// Handle onto the counters, usable while a store borrows the region.
    pub fn stats(&self) -> Rc<RefCell<Stats>> {
        Rc::clone(&self.stats)
    }

    /// Overwrite the whole region, bypassing granularity rules.
    pub fn fill(&mut self, byte: u8) {
        self.mem.fill(byte);
    }

    fn in_bounds(offset: u32, len: usize) -> bool {
        (offset as usize).checked_add(len).is_some_and(|end| end <= S as usize)
    }
}

impl<const S: u32, const E: u32, const W: u32> NvMemory for GridMemory<S, E, W> {
    const SIZE: u32 = S;
    const ERASE_GRANULARITY: u32 = E;
    const WRITE_GRANULARITY: u32 = W;

    fn read(&mut self, offset: u32, dst: &mut [u8]) -> bool {
        if !Self::in_bounds(offset, dst.len()) {
            return false;
        }
        let offset = offset as usize;
        dst.copy_from_slice(&self.mem[offset..offset + dst.len()]);
        true
    }

    fn writable(&mut self, offset: u32, len: u32) -> bool {
        if offset % W != 0 || len % W != 0 || !Self::in_bounds(offset, len as usize) {
            return false;
        }
        let (offset, len) = (offset as usize, len as usize);
        self.mem[offset..offset + len].iter().all(|&b| b == 0xFF)
    }

    fn write(&mut self, offset: u32, src: &[u8]) -> bool {
        if !Self::in_bounds(offset, src.len()) {
            return false;
        }

        let mut stats = self.stats.borrow_mut();
        let applied = match stats.write_budget {
            Some(budget) => budget.min(src.len()),
            None => src.len(),
        };
        if let Some(budget) = stats.write_budget.as_mut() {
            *budget -= applied;
        }

        let offset = offset as usize;
        self.mem[offset..offset + applied].copy_from_slice(&src[..applied]);
        stats.bytes_written += applied as u64;
        for i in offset..offset + applied {
            stats.write_hist[i] += 1;
        }

        applied == src.len()
    }

    fn erase(&mut self, offset: u32, len: u32) -> bool {
        if offset % E != 0 || len % E != 0 || !Self::in_bounds(offset, len as usize) {
            return false;
        }

        let (offset, len) = (offset as usize, len as usize);
        self.mem[offset..offset + len].fill(0xFF);

        let mut stats = self.stats.borrow_mut();
        stats.erases += 1;
        for i in offset..offset + len {
            stats.erase_hist[i] += 1;
        }
        true
    }
}

/// MINSTD generator for deterministic pseudo-random payloads.
pub struct Lcg(u32);

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    pub fn next_byte(&mut self) -> u8 {
        self.0 = ((self.0 as u64 * 48271) % 0x7FFF_FFFF) as u32;
        (self.0 >> 16) as u8
    }
}

/// Payload `i` of the test sequence. Pseudo-random except the leading
/// byte, which carries `i` so consecutive payloads always differ.
pub fn payload<const P: usize>(i: u32) -> [u8; P] {
    let mut rng = Lcg::new(i.wrapping_add(1));
    let mut out = [0u8; P];
    for byte in out.iter_mut() {
        *byte = rng.next_byte();
    }
    out[0] = i as u8;
    out
}

/// Write a record directly to the medium, bypassing the store. Lets
/// tests stage arbitrary sequence-number patterns.
pub fn plant_record<const S: u32, const E: u32, const W: u32>(
    mem: &mut GridMemory<S, E, W>,
    geo: Geometry,
    index: u32,
    seq: u32,
    payload: &[u8],
    version: u8,
) {
    let mut frame = vec![0xFF; geo.record_len as usize];
    frame[format::HEADER_LEN..format::HEADER_LEN + payload.len()].copy_from_slice(payload);
    format::encode(&mut frame, version, seq);
    assert!(mem.write(geo.offset(index), &frame));
}

/// Nonzero histogram values must collapse to one value, or two adjacent
/// ones: the wear-leveling contract.
pub fn assert_even_wear(hist: &[u32], what: &str) {
    let values: BTreeSet<u32> = hist.iter().copied().filter(|&v| v != 0).collect();

    assert!(!values.is_empty(), "no {} recorded at all", what);
    assert!(
        values.len() <= 2,
        "{} counts take {} distinct values: {:?}",
        what,
        values.len(),
        values
    );
    if values.len() == 2 {
        let mut iter = values.iter();
        let (low, high) = (*iter.next().unwrap(), *iter.next().unwrap());
        assert_eq!(high - low, 1, "{} counts {} and {} differ by more than one", what, low, high);
    }
}

// ---------------------------------------------------------------------------
// Property checks, one store geometry per instantiation
// ---------------------------------------------------------------------------

pub fn first_read_fails<const S: u32, const E: u32, const W: u32, const P: usize>() {
    let mut mem = GridMemory::<S, E, W>::new();
    let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
    cell.init().unwrap();
    assert_eq!(cell.load(), Err(NvError::NoData));
}

pub fn round_trip<const S: u32, const E: u32, const W: u32, const P: usize>() {
    let mut mem = GridMemory::<S, E, W>::new();
    let blocks = Geometry::compute(S, E, W, P as u32).unwrap().count;

    // Enough saves to lap the ring twice.
    for i in 0..2 * blocks + 10 {
        let value = payload::<P>(i);
        {
            let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
            cell.init().unwrap();
            cell.save(&value).unwrap();
        }

        let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
        cell.init().unwrap();
        assert_eq!(cell.load(), Ok(value), "value lost after save {}", i);
    }
}

pub fn tamper_detected<const S: u32, const E: u32, const W: u32, const P: usize>() {
    let mut mem = GridMemory::<S, E, W>::new();

    {
        let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
        cell.init().unwrap();
        cell.save(&payload::<P>(0)).unwrap();
    }

    // The first save of a fresh store lands in block 0.
    mem.mem[0] ^= 1;

    let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
    cell.init().unwrap();
    assert_eq!(cell.load(), Err(NvError::NoData));
}

pub fn wrong_version_rejected<const S: u32, const E: u32, const W: u32, const P: usize>() {
    let mut mem = GridMemory::<S, E, W>::new();

    {
        let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
        cell.init().unwrap();
        cell.save(&payload::<P>(0)).unwrap();
    }

    let mut older = NvCell::<_, [u8; P], { VERSION - 1 }>::new(&mut mem).unwrap();
    older.init().unwrap();
    assert_eq!(older.load(), Err(NvError::NoData));

    let mut newer = NvCell::<_, [u8; P], { VERSION + 1 }>::new(&mut mem).unwrap();
    newer.init().unwrap();
    assert_eq!(newer.load(), Err(NvError::NoData));
}

pub fn overwritten_region_is_empty<const S: u32, const E: u32, const W: u32, const P: usize>(
    fill: u8,
) {
    let mut mem = GridMemory::<S, E, W>::new();

    {
        let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
        cell.init().unwrap();
        cell.save(&payload::<P>(0)).unwrap();
    }

    mem.fill(fill);

    let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
    cell.init().unwrap();
    assert_eq!(cell.load(), Err(NvError::NoData));
}

pub fn wear_spreads_evenly<const S: u32, const E: u32, const W: u32, const P: usize>() {
    let mut mem = GridMemory::<S, E, W>::new();
    let stats = mem.stats();

    let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
    let blocks = cell.geometry().count;
    cell.init().unwrap();

    for i in 0..2 * blocks + blocks / 2 + 3 {
        cell.save(&payload::<P>(i)).unwrap();
    }
    drop(cell);

    let stats = stats.borrow();
    assert_even_wear(&stats.erase_hist, "erase");
    assert_even_wear(&stats.write_hist, "write");
}

pub fn same_payload_writes_nothing<const S: u32, const E: u32, const W: u32, const P: usize>() {
    let mut mem = GridMemory::<S, E, W>::new();
    let stats = mem.stats();

    let mut cell = Cell::<S, E, W, P>::new(&mut mem).unwrap();
    cell.init().unwrap();

    for i in 0..50 {
        let value = payload::<P>(i);

        let before = stats.borrow().bytes_written;
        cell.save(&value).unwrap();
        assert!(stats.borrow().bytes_written > before, "save {} wrote nothing", i);

        let before = stats.borrow().bytes_written;
        cell.save(&value).unwrap();
        assert_eq!(
            stats.borrow().bytes_written,
            before,
            "repeated save {} touched the medium",
            i
        );
    }
}
