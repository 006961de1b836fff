//! # Account state-init
//!
//! ```text
//! _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
//!   code:(Maybe ^Cell) data:(Maybe ^Cell)
//!   library:(HashmapE 256 SimpleLib) = StateInit;
//! tick_tock$_ tick:Bool tock:Bool = TickTock;
//! simple_lib$_ public:Bool root:^Cell = SimpleLib;
//! ```
//!
//! Decoding reads the root cell in exactly that order and requires every bit
//! and reference to be consumed. Re-encoding ([`StateInit::to_cell`]) writes the
//! same fields in the same order, so the hash of the re-encoded cell is the
//! account id the state-init deploys to.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::address::ParsedAddress;
use crate::boc::{self, BocError, Cell, CellBuilder, CellSlice};

/// Key width of the library table (library code hash)
pub const LIBRARY_KEY_BITS: usize = 256;

/// Most library entries a state-init may carry
pub const MAX_LIBRARY_ENTRIES: usize = 256;

const SPLIT_DEPTH_BITS: usize = 5;

#[derive(Debug, Error)]
pub enum StateInitError {
    #[error("Invalid bag of cells: {0}")]
    Boc(#[from] BocError),

    #[error("Malformed state-init: {0}")]
    Malformed(String),

    #[error("Malformed library dictionary: {0}")]
    Dictionary(String),
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickTock {
    pub tick: bool,
    pub tock: bool,
}

/// One entry of the library table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleLib {
    pub public: bool,
    pub root: Arc<Cell>,
}

/// Library table: parsed entries plus the original dictionary root.
///
/// The root is kept so re-encoding reproduces the exact dictionary layout
/// (label encodings are not unique).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Libraries {
    pub root: Arc<Cell>,
    pub entries: Vec<([u8; 32], SimpleLib)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateInit {
    pub split_depth: Option<u8>,
    pub special: Option<TickTock>,
    pub code: Option<Arc<Cell>>,
    pub data: Option<Arc<Cell>>,
    pub libraries: Option<Libraries>,
}

/// Exact-match registry key: canonical BOC of the code cell, base64
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(code: &Arc<Cell>) -> Self {
        Self(boc::to_base64(code))
    }

    pub fn from_boc(encoded: &str) -> Self {
        Self(encoded.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A decoded state-init plus the registry key for its code, when usable
#[derive(Debug, Clone)]
pub struct DecodedStateInit {
    pub state_init: StateInit,
    /// Present only when both code and data references exist
    pub fingerprint: Option<Fingerprint>,
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode a base64 bag of cells holding a state-init
pub fn decode(blob_b64: &str) -> Result<DecodedStateInit, StateInitError> {
    let root = boc::from_base64(blob_b64)?;
    let state_init = StateInit::from_cell(&root)?;
    let fingerprint = state_init.fingerprint();
    Ok(DecodedStateInit {
        state_init,
        fingerprint,
    })
}

impl StateInit {
    pub fn from_cell(cell: &Cell) -> Result<Self, StateInitError> {
        let mut s = cell.parser();

        let split_depth = if s.load_bit()? {
            Some(s.load_uint(SPLIT_DEPTH_BITS)? as u8)
        } else {
            None
        };

        let special = if s.load_bit()? {
            Some(TickTock {
                tick: s.load_bit()?,
                tock: s.load_bit()?,
            })
        } else {
            None
        };

        let code = s.load_maybe_ref()?.cloned();
        let data = s.load_maybe_ref()?.cloned();
        let libraries = match s.load_maybe_ref()? {
            Some(root) => Some(Libraries {
                entries: parse_library_dict(root)?,
                root: Arc::clone(root),
            }),
            None => None,
        };

        s.ensure_empty()
            .map_err(|e| StateInitError::Malformed(e.to_string()))?;

        Ok(Self {
            split_depth,
            special,
            code,
            data,
            libraries,
        })
    }

    /// Re-encode in decoding order
    pub fn to_cell(&self) -> Result<Cell, StateInitError> {
        let mut b = CellBuilder::new();

        match self.split_depth {
            Some(depth) => {
                b.store_bit(true)?;
                b.store_uint(u64::from(depth), SPLIT_DEPTH_BITS)?;
            }
            None => {
                b.store_bit(false)?;
            }
        }

        match self.special {
            Some(tt) => {
                b.store_bit(true)?;
                b.store_bit(tt.tick)?;
                b.store_bit(tt.tock)?;
            }
            None => {
                b.store_bit(false)?;
            }
        }

        b.store_maybe_ref(self.code.as_ref())?;
        b.store_maybe_ref(self.data.as_ref())?;
        b.store_maybe_ref(self.libraries.as_ref().map(|l| &l.root))?;

        Ok(b.build()?)
    }

    /// Registry key for the code cell; `None` unless both code and data exist
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match (&self.code, &self.data) {
            (Some(code), Some(_)) => Some(Fingerprint::of(code)),
            _ => None,
        }
    }

    pub fn to_boc_base64(&self) -> Result<String, StateInitError> {
        Ok(boc::to_base64(&Arc::new(self.to_cell()?)))
    }
}

// ============================================================================
// ADDRESS DERIVATION
// ============================================================================

/// The address this state-init deploys to on `workchain`
pub fn derive_address(state_init: &StateInit, workchain: i8) -> Result<ParsedAddress, StateInitError> {
    let cell = state_init.to_cell()?;
    Ok(ParsedAddress::new(workchain, cell.hash()))
}

// ============================================================================
// LIBRARY DICTIONARY
// ============================================================================

fn parse_library_dict(root: &Arc<Cell>) -> Result<Vec<([u8; 32], SimpleLib)>, StateInitError> {
    let mut entries = Vec::new();
    let mut prefix = Vec::with_capacity(LIBRARY_KEY_BITS);
    walk_edge(root, LIBRARY_KEY_BITS, &mut prefix, &mut entries)?;
    Ok(entries)
}

/// `hm_edge#_ label:(HmLabel ~l n) node:(HashmapNode m X)` with `n = l + m`
fn walk_edge(
    cell: &Arc<Cell>,
    n: usize,
    prefix: &mut Vec<bool>,
    out: &mut Vec<([u8; 32], SimpleLib)>,
) -> Result<(), StateInitError> {
    let mut s = cell.parser();
    let label = load_label(&mut s, n)?;
    let depth_before = prefix.len();
    prefix.extend_from_slice(&label);
    let m = n - label.len();

    if m == 0 {
        // shared forks make the leaf count exponential in the cell count
        if out.len() >= MAX_LIBRARY_ENTRIES {
            return Err(StateInitError::Dictionary(format!(
                "more than {} library entries",
                MAX_LIBRARY_ENTRIES
            )));
        }
        let public = s.load_bit()?;
        let lib_root = Arc::clone(s.load_ref()?);
        s.ensure_empty()
            .map_err(|e| StateInitError::Dictionary(format!("library leaf: {}", e)))?;
        out.push((
            pack_key(prefix),
            SimpleLib {
                public,
                root: lib_root,
            },
        ));
    } else {
        let left = s.load_ref()?;
        let right = s.load_ref()?;
        s.ensure_empty()
            .map_err(|e| StateInitError::Dictionary(format!("fork: {}", e)))?;
        for (bit, child) in [(false, left), (true, right)] {
            prefix.push(bit);
            walk_edge(child, m - 1, prefix, out)?;
            prefix.pop();
        }
    }

    prefix.truncate(depth_before);
    Ok(())
}

/// `HmLabel ~l m`: short (unary length), long (explicit length) or same-bit run
fn load_label(s: &mut CellSlice<'_>, max_len: usize) -> Result<Vec<bool>, StateInitError> {
    let len_bits = bits_for(max_len);

    if !s.load_bit()? {
        // hml_short$0 len:(Unary ~n) s:(n * Bit)
        let mut len = 0usize;
        while s.load_bit()? {
            len += 1;
            if len > max_len {
                return Err(StateInitError::Dictionary("label longer than key".to_string()));
            }
        }
        return Ok(s.load_bit_vec(len)?);
    }

    if !s.load_bit()? {
        // hml_long$10 n:(#<= m) s:(n * Bit)
        let len = s.load_uint(len_bits)? as usize;
        if len > max_len {
            return Err(StateInitError::Dictionary("label longer than key".to_string()));
        }
        return Ok(s.load_bit_vec(len)?);
    }

    // hml_same$11 v:Bit n:(#<= m)
    let bit = s.load_bit()?;
    let len = s.load_uint(len_bits)? as usize;
    if len > max_len {
        return Err(StateInitError::Dictionary("label longer than key".to_string()));
    }
    Ok(vec![bit; len])
}

/// Bits needed to store any value in `0..=max`
fn bits_for(max: usize) -> usize {
    (usize::BITS - max.leading_zeros()) as usize
}

fn pack_key(bits: &[bool]) -> [u8; 32] {
    let mut key = [0u8; 32];
    for (i, bit) in bits.iter().enumerate().take(LIBRARY_KEY_BITS) {
        if *bit {
            key[i / 8] |= 1 << (7 - i % 8);
        }
    }
    key
}
