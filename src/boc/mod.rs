//! # Bag of Cells
//!
//! Everything the proof verifier needs from the TON cell model:
//!
//! - [`Cell`] / [`CellBuilder`]: ordinary cells and their representation hash
//! - [`CellSlice`]: a copyable bit cursor used by every structured parser
//! - [`deserialize_boc`] / [`serialize_boc`]: the binary "bag of cells"
//!   container, with CRC32C checking on the way in and a single canonical
//!   layout on the way out
//!
//! Exotic cells (pruned branches, library cells, Merkle proofs) never appear in
//! a wallet state-init and are rejected.

pub mod cell;
pub mod reader;
pub mod serialize;

pub use cell::{Cell, CellBuilder, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_REFS};
pub use reader::CellSlice;
pub use serialize::{deserialize_boc, from_base64, serialize_boc, to_base64};

use thiserror::Error;

/// Errors raised while building, reading or (de)serializing cells
#[derive(Debug, Error)]
pub enum BocError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unknown bag-of-cells magic: 0x{0:08x}")]
    InvalidMagic(u32),

    #[error("Unexpected end of input while reading {field}")]
    UnexpectedEnd { field: &'static str },

    #[error("Invalid bag-of-cells header: {0}")]
    InvalidHeader(String),

    #[error("Invalid cell #{index}: {reason}")]
    InvalidCell { index: usize, reason: &'static str },

    #[error("Exotic cell #{0} is not supported")]
    UnsupportedExotic(usize),

    #[error("CRC32C mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("{0} trailing bytes after bag of cells")]
    TrailingBytes(usize),

    #[error("Cell overflow: {bits} bits, {refs} refs")]
    CellOverflow { bits: usize, refs: usize },

    #[error("Cell tree too deep: {depth}")]
    DepthLimit { depth: usize },

    #[error("Cell underflow: requested {requested} bits, {remaining} remaining")]
    CellUnderflow { requested: usize, remaining: usize },

    #[error("Cell has no reference at position {index}")]
    RefUnderflow { index: usize },

    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u64, bits: usize },

    #[error("Unconsumed cell data: {bits} bits, {refs} refs left")]
    UnconsumedData { bits: usize, refs: usize },
}
