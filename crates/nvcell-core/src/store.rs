//! Store engine: block scan, load, save, legacy migration
//!
//! The engine keeps a logical append-only log over the ring of blocks the
//! geometry carves out of the region. Each save targets the block after
//! the current one and stamps it with the next sequence number; recovery
//! is a scan that finds the tail of the sequence run. A save that dies
//! mid-write leaves a block that fails its CRC, so the next scan lands on
//! the previous tail; the medium never presents garbage as data.
//!
//! Erases spread evenly because placement is dictated purely by ring
//! position, never by content: over any long run of distinct saves the
//! per-byte erase counts across the region differ by at most one.

use std::marker::PhantomData;

use log::{debug, trace, warn};

use crate::error::{BackendOp, NvError, NvResult};
use crate::format;
use crate::geometry::Geometry;
use crate::memory::NvMemory;
use crate::payload::Payload;

/// How a [`NvCell::load_legacy`] value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded<T> {
    /// Read under the store's own version.
    Current(T),
    /// Recovered under the older version and converted.
    Legacy(T),
}

impl<T> Loaded<T> {
    /// The payload, regardless of which path produced it.
    pub fn into_value(self) -> T {
        match self {
            Loaded::Current(value) | Loaded::Legacy(value) => value,
        }
    }

    /// Whether the older-version fallback produced this value.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Loaded::Legacy(_))
    }
}

/// The block holding the most recent valid save.
#[derive(Debug, Clone, Copy)]
struct Tail {
    index: u32,
    seq: u32,
}

/// Persistent single-record store over a raw memory region.
///
/// `M` is the medium, `T` the payload type, `VERSION` the schema tag
/// stamped on every record. The store borrows its region exclusively;
/// two stores over the same region cannot coexist.
///
/// Call [`init`](Self::init) once after construction, before any
/// [`load`](Self::load) or [`save`](Self::save).
pub struct NvCell<'m, M: NvMemory, T: Payload, const VERSION: u8> {
    mem: &'m mut M,
    geo: Geometry,
    tail: Option<Tail>,
    /// Payload bytes of the tail block; meaningful only when `tail` is set.
    held: Vec<u8>,
    /// Encode buffer, `write_len` bytes. Trailing bytes beyond the record
    /// stay at the fill value so partial-granule writes program no data.
    scratch: Vec<u8>,
    /// Decode buffer, `record_len` bytes.
    frame: Vec<u8>,
    ready: bool,
    _payload: PhantomData<T>,
}

impl<'m, M: NvMemory, T: Payload, const VERSION: u8> NvCell<'m, M, T, VERSION> {
    /// Bind a store to a memory region. Computes the block geometry and
    /// allocates the instance scratch buffers; performs no I/O. Errors
    /// when the region cannot hold a single record of `T`'s size.
    pub fn new(mem: &'m mut M) -> NvResult<Self> {
        let geo = Geometry::new::<M>(T::SIZE as u32)?;

        Ok(Self {
            mem,
            geo,
            tail: None,
            held: vec![0; T::SIZE],
            scratch: vec![M::FILL_BYTE; geo.write_len as usize],
            frame: vec![0; geo.record_len as usize],
            ready: false,
            _payload: PhantomData,
        })
    }

    /// The block layout this store operates under.
    pub fn geometry(&self) -> Geometry {
        self.geo
    }

    /// Scan every block and locate the newest valid record, if any.
    ///
    /// Succeeds whether or not data is found; an empty region is a valid
    /// store that [`load`](Self::load) reports as [`NvError::NoData`].
    pub fn init(&mut self) -> NvResult<()> {
        self.tail = None;

        let mut hits: Vec<(u32, u32)> = Vec::with_capacity(self.geo.count as usize);

        for index in 0..self.geo.count {
            let offset = self.geo.offset(index);
            if !self.mem.read(offset, &mut self.frame) {
                return Err(NvError::Backend {
                    op: BackendOp::Read,
                    offset,
                    len: self.geo.record_len,
                });
            }
            if let Some(record) = format::decode(&self.frame, VERSION) {
                hits.push((index, record.seq));
            }
        }

        debug!(
            "scan found {} valid block(s) out of {} under version {}",
            hits.len(),
            self.geo.count,
            VERSION
        );

        let chosen = match hits.len() {
            0 => None,
            1 => Some(hits[0]),
            _ => Some(Self::select_tail(&hits)),
        };

        if let Some((index, seq)) = chosen {
            let offset = self.geo.offset(index);
            if !self.mem.read(offset, &mut self.frame) {
                return Err(NvError::Backend {
                    op: BackendOp::Read,
                    offset,
                    len: self.geo.record_len,
                });
            }
            if let Some(record) = format::decode(&self.frame, VERSION) {
                self.held.copy_from_slice(record.payload);
                self.tail = Some(Tail { index, seq });
                debug!("recovered sequence {} at block {}", seq, index);
            }
        }

        self.ready = true;
        Ok(())
    }

    /// The tail of a contiguous sequence run is the block whose successor
    /// sequence number belongs to no other valid block. A region where
    /// zero or several such blocks exist has lost its run structure; the
    /// numerically greatest sequence is the best remaining guess.
    fn select_tail(hits: &[(u32, u32)]) -> (u32, u32) {
        let mut tails = hits
            .iter()
            .copied()
            .filter(|&(_, seq)| {
                !hits.iter().any(|&(_, other)| other == seq.wrapping_add(1))
            });

        match (tails.next(), tails.next()) {
            (Some(tail), None) => tail,
            _ => {
                warn!(
                    "sequence run over {} valid blocks is not contiguous; \
                     falling back to the highest sequence number",
                    hits.len()
                );
                // hits is non-empty here, so max_by_key always yields.
                hits.iter().copied().max_by_key(|&(_, seq)| seq).unwrap_or(hits[0])
            }
        }
    }

    /// Copy of the current payload, or [`NvError::NoData`] when the
    /// region holds no valid record of this version.
    pub fn load(&mut self) -> NvResult<T> {
        debug_assert!(self.ready, "init() must run before load()");

        match &self.tail {
            None => Err(NvError::NoData),
            Some(_) => Ok(T::read_from(&self.held)),
        }
    }

    /// Persist `value` as the new current record.
    ///
    /// Appends to the next ring position with the next sequence number,
    /// erasing that block first if it is not already writable. Saving a
    /// payload identical to the held one touches nothing: the medium sees
    /// zero writes and the ring does not advance.
    pub fn save(&mut self, value: &T) -> NvResult<()> {
        debug_assert!(self.ready, "init() must run before save()");

        let payload_at = format::HEADER_LEN;
        let record_len = self.geo.record_len as usize;

        self.scratch.fill(M::FILL_BYTE);
        value.write_to(&mut self.scratch[payload_at..payload_at + T::SIZE]);

        if self.tail.is_some() && self.scratch[payload_at..payload_at + T::SIZE] == self.held[..] {
            trace!("payload unchanged; suppressing save");
            return Ok(());
        }

        let (index, seq) = match &self.tail {
            None => (0, 0),
            Some(tail) => ((tail.index + 1) % self.geo.count, tail.seq.wrapping_add(1)),
        };

        format::encode(&mut self.scratch[..record_len], VERSION, seq);

        let offset = self.geo.offset(index);

        if !self.mem.writable(offset, self.geo.write_len) {
            trace!("block {} holds data; erasing before write", index);
            if !self.mem.erase(offset, self.geo.stride) {
                return Err(NvError::Backend {
                    op: BackendOp::Erase,
                    offset,
                    len: self.geo.stride,
                });
            }
        }

        if !self.mem.write(offset, &self.scratch[..self.geo.write_len as usize]) {
            return Err(NvError::Backend {
                op: BackendOp::Write,
                offset,
                len: self.geo.write_len,
            });
        }

        self.held.copy_from_slice(&self.scratch[payload_at..payload_at + T::SIZE]);
        self.tail = Some(Tail { index, seq });
        Ok(())
    }

    /// Load under this store's version, falling back to an older schema.
    ///
    /// When the current version holds no data, a transient store
    /// configured for `T0` and `V0` rescans the same region. An older
    /// payload size implies an entirely different block layout, which is
    /// why the fallback is a full second scan rather than a reparse.
    /// A recovered older payload is passed through `convert` and tagged
    /// [`Loaded::Legacy`]; the medium is never written. The next
    /// [`save`](Self::save) is what migrates storage forward.
    pub fn load_legacy<T0, const V0: u8, F>(&mut self, convert: F) -> NvResult<Loaded<T>>
    where
        T0: Payload,
        F: FnOnce(T0) -> T,
    {
        match self.load() {
            Ok(value) => Ok(Loaded::Current(value)),
            Err(NvError::NoData) => {
                debug!("no current-version data; scanning under legacy version {}", V0);
                let mut older: NvCell<'_, M, T0, V0> = NvCell::new(&mut *self.mem)?;
                older.init()?;
                let old = older.load()?;
                Ok(Loaded::Legacy(convert(old)))
            }
            Err(err) => Err(err),
        }
    }
}
