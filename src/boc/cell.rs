//! # Cells
//!
//! Ordinary TON cells: up to 1023 data bits and up to 4 child references.
//! Depth and representation hash are computed once when the cell is built.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::reader::CellSlice;
use super::BocError;

/// Maximum number of data bits in a single cell
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of child references in a single cell
pub const MAX_CELL_REFS: usize = 4;

/// Deepest cell tree the chain accepts
pub const MAX_CELL_DEPTH: u16 = 1024;

// ============================================================================
// CELL
// ============================================================================

/// An immutable, ordinary (level 0, non-exotic) cell
#[derive(Clone)]
pub struct Cell {
    /// Data bytes; bits past `bit_len` are always zero
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    depth: u16,
    hash: [u8; 32],
}

impl Cell {
    /// Build a cell from raw bits and references.
    ///
    /// `data` must hold at least `bit_len` bits. Extra bytes are dropped and
    /// unused trailing bits are cleared.
    pub fn new(mut data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Result<Self, BocError> {
        if bit_len > MAX_CELL_BITS || refs.len() > MAX_CELL_REFS {
            return Err(BocError::CellOverflow {
                bits: bit_len,
                refs: refs.len(),
            });
        }

        let byte_len = (bit_len + 7) / 8;
        if data.len() < byte_len {
            return Err(BocError::CellUnderflow {
                requested: bit_len,
                remaining: data.len() * 8,
            });
        }
        data.truncate(byte_len);
        if bit_len % 8 != 0 {
            let keep = 0xffu8 << (8 - bit_len % 8);
            data[byte_len - 1] &= keep;
        }

        let depth = refs.iter().map(|r| r.depth + 1).max().unwrap_or(0);
        if depth > MAX_CELL_DEPTH {
            return Err(BocError::DepthLimit { depth: usize::from(depth) });
        }

        let mut cell = Self {
            data,
            bit_len,
            refs,
            depth,
            hash: [0u8; 32],
        };
        cell.hash = cell.compute_hash();
        Ok(cell)
    }

    /// A cell with no bits and no references
    pub fn empty() -> Self {
        let mut cell = Self {
            data: Vec::new(),
            bit_len: 0,
            refs: Vec::new(),
            depth: 0,
            hash: [0u8; 32],
        };
        cell.hash = cell.compute_hash();
        cell
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Raw data bytes (`ceil(bit_len / 8)` of them, no completion tag)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.refs.get(index)
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Representation hash (SHA-256 of the standard cell representation)
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Start reading this cell from its first bit and first reference
    pub fn parser(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// The two descriptor bytes `d1 d2`.
    ///
    /// `d1 = refs + 8 * exotic + 32 * level` (always ordinary, level 0 here),
    /// `d2 = floor(bits / 8) + ceil(bits / 8)`.
    pub fn descriptors(&self) -> [u8; 2] {
        let d1 = self.refs.len() as u8;
        let d2 = (self.bit_len / 8 + (self.bit_len + 7) / 8) as u8;
        [d1, d2]
    }

    /// Data bytes with the completion tag appended when the last byte is partial
    pub fn padded_data(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        let rem = self.bit_len % 8;
        if rem != 0 {
            if let Some(last) = out.last_mut() {
                *last |= 1 << (7 - rem);
            }
        }
        out
    }

    fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.descriptors());
        hasher.update(self.padded_data());
        for child in &self.refs {
            hasher.update(child.depth.to_be_bytes());
        }
        for child in &self.refs {
            hasher.update(child.hash);
        }
        hasher.finalize().into()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len)
            .field("data", &hex::encode(&self.data))
            .field("refs", &self.refs.len())
            .field("hash", &self.hash_hex())
            .finish()
    }
}

// ============================================================================
// CELL BUILDER
// ============================================================================

/// Incremental writer producing a [`Cell`]
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, BocError> {
        if self.bit_len >= MAX_CELL_BITS {
            return Err(BocError::CellOverflow {
                bits: self.bit_len + 1,
                refs: self.refs.len(),
            });
        }
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let idx = self.bit_len / 8;
            self.data[idx] |= 1 << (7 - self.bit_len % 8);
        }
        self.bit_len += 1;
        Ok(self)
    }

    /// Store the low `bits` bits of `value`, most significant first
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, BocError> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(BocError::ValueOutOfRange { value, bits });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }
        Ok(self)
    }

    /// Store the first `bit_len` bits of `bytes`
    pub fn store_bits(&mut self, bytes: &[u8], bit_len: usize) -> Result<&mut Self, BocError> {
        if bytes.len() * 8 < bit_len {
            return Err(BocError::CellUnderflow {
                requested: bit_len,
                remaining: bytes.len() * 8,
            });
        }
        self.ensure_bits(bit_len)?;
        for i in 0..bit_len {
            self.store_bit(bytes[i / 8] & (1 << (7 - i % 8)) != 0)?;
        }
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, BocError> {
        self.store_bits(bytes, bytes.len() * 8)
    }

    pub fn store_reference(&mut self, cell: Arc<Cell>) -> Result<&mut Self, BocError> {
        if self.refs.len() >= MAX_CELL_REFS {
            return Err(BocError::CellOverflow {
                bits: self.bit_len,
                refs: self.refs.len() + 1,
            });
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// `Maybe ^Cell`: a presence bit followed by the reference when present
    pub fn store_maybe_ref(&mut self, cell: Option<&Arc<Cell>>) -> Result<&mut Self, BocError> {
        match cell {
            Some(cell) => {
                self.store_bit(true)?;
                self.store_reference(Arc::clone(cell))
            }
            None => self.store_bit(false),
        }
    }

    pub fn build(self) -> Result<Cell, BocError> {
        Cell::new(self.data, self.bit_len, self.refs)
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), BocError> {
        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(BocError::CellOverflow {
                bits: self.bit_len + bits,
                refs: self.refs.len(),
            });
        }
        Ok(())
    }
}
