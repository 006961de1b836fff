//! Bit cursor over a single cell.
//!
//! A `CellSlice` is just a borrowed cell plus two offsets (bits consumed and
//! references consumed). It is `Copy`, so a parser can checkpoint by copying
//! the slice and every read is bounds-checked against the remaining bits.

use std::sync::Arc;

use super::cell::Cell;
use super::BocError;

#[derive(Debug, Clone, Copy)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_offset: usize,
    ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_offset: 0,
            ref_offset: 0,
        }
    }

    pub fn cell(&self) -> &'a Cell {
        self.cell
    }

    pub fn bit_position(&self) -> usize {
        self.bit_offset
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_offset
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    pub fn load_bit(&mut self) -> Result<bool, BocError> {
        self.ensure_bits(1)?;
        let bit = self.peek_bit(self.bit_offset);
        self.bit_offset += 1;
        Ok(bit)
    }

    /// Read `bits` (at most 64) as a big-endian unsigned integer
    pub fn load_uint(&mut self, bits: usize) -> Result<u64, BocError> {
        if bits > 64 {
            return Err(BocError::ValueOutOfRange { value: 0, bits });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.peek_bit(self.bit_offset));
            self.bit_offset += 1;
        }
        Ok(value)
    }

    /// Read `len` whole bytes (the cursor does not need to be byte aligned)
    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>, BocError> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.load_uint(8)? as u8);
        }
        Ok(out)
    }

    pub fn load_array<const N: usize>(&mut self) -> Result<[u8; N], BocError> {
        let bytes = self.load_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Read `bits` individual bits, most significant first
    pub fn load_bit_vec(&mut self, bits: usize) -> Result<Vec<bool>, BocError> {
        self.ensure_bits(bits)?;
        let mut out = Vec::with_capacity(bits);
        for _ in 0..bits {
            out.push(self.load_bit()?);
        }
        Ok(out)
    }

    pub fn skip_bits(&mut self, bits: usize) -> Result<(), BocError> {
        self.ensure_bits(bits)?;
        self.bit_offset += bits;
        Ok(())
    }

    pub fn load_ref(&mut self) -> Result<&'a Arc<Cell>, BocError> {
        let cell: &'a Cell = self.cell;
        let child = cell
            .reference(self.ref_offset)
            .ok_or(BocError::RefUnderflow {
                index: self.ref_offset,
            })?;
        self.ref_offset += 1;
        Ok(child)
    }

    /// `Maybe ^Cell`: a presence bit, then a reference if the bit is set
    pub fn load_maybe_ref(&mut self) -> Result<Option<&'a Arc<Cell>>, BocError> {
        if self.load_bit()? {
            self.load_ref().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Fail unless every bit and reference has been consumed
    pub fn ensure_empty(&self) -> Result<(), BocError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BocError::UnconsumedData {
                bits: self.remaining_bits(),
                refs: self.remaining_refs(),
            })
        }
    }

    fn peek_bit(&self, index: usize) -> bool {
        self.cell.data()[index / 8] & (1 << (7 - index % 8)) != 0
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), BocError> {
        if bits > self.remaining_bits() {
            return Err(BocError::CellUnderflow {
                requested: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }
}
