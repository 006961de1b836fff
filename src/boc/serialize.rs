//! Bag-of-cells (BOC) container format.
//!
//! Reading accepts the generic layout (`b5ee9c72`) and the two legacy indexed
//! layouts. Writing always produces one canonical layout: single root,
//! parents before children, minimal size fields, no index, CRC32C trailer.
//! Fingerprints of wallet code rely on that layout being stable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::cell::Cell;
use super::BocError;

const BOC_GENERIC_MAGIC: u32 = 0xb5ee_9c72;
const BOC_INDEXED_MAGIC: u32 = 0x68ff_65f3;
const BOC_INDEXED_CRC32_MAGIC: u32 = 0xacc3_a728;

const FLAG_HAS_INDEX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;
const SIZE_MASK: u8 = 0x07;

// ============================================================================
// BYTE CURSOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    fn read_exact(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], BocError> {
        if len > self.remaining() {
            return Err(BocError::UnexpectedEnd { field });
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..start + len])
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, BocError> {
        Ok(self.read_exact(1, field)?[0])
    }

    fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], BocError> {
        let bytes = self.read_exact(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Big-endian unsigned integer of `len` bytes
    fn read_uint(&mut self, len: usize, field: &'static str) -> Result<usize, BocError> {
        let bytes = self.read_exact(len, field)?;
        let value = bytes
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        usize::try_from(value)
            .map_err(|_| BocError::InvalidHeader(format!("{} does not fit in memory", field)))
    }
}

// ============================================================================
// DESERIALIZATION
// ============================================================================

/// A cell as laid out in the container, before references are resolved
struct RawCell<'a> {
    data: &'a [u8],
    bit_len: usize,
    refs: Vec<usize>,
}

/// Parse a serialized bag of cells with exactly one root
pub fn deserialize_boc(bytes: &[u8]) -> Result<Arc<Cell>, BocError> {
    let mut r = ByteReader::new(bytes);

    let magic = u32::from_be_bytes(r.read_array::<4>("magic")?);
    let (has_index, has_crc, ref_size, generic) = match magic {
        BOC_GENERIC_MAGIC => {
            let flags = r.read_u8("flags")?;
            (
                flags & FLAG_HAS_INDEX != 0,
                flags & FLAG_HAS_CRC32C != 0,
                (flags & SIZE_MASK) as usize,
                true,
            )
        }
        BOC_INDEXED_MAGIC => (true, false, r.read_u8("size")? as usize, false),
        BOC_INDEXED_CRC32_MAGIC => (true, true, r.read_u8("size")? as usize, false),
        other => return Err(BocError::InvalidMagic(other)),
    };

    if !(1..=4).contains(&ref_size) {
        return Err(BocError::InvalidHeader(format!("reference size {}", ref_size)));
    }
    let off_size = r.read_u8("offset size")? as usize;
    if !(1..=8).contains(&off_size) {
        return Err(BocError::InvalidHeader(format!("offset size {}", off_size)));
    }

    let cell_count = r.read_uint(ref_size, "cell count")?;
    let root_count = r.read_uint(ref_size, "root count")?;
    let absent_count = r.read_uint(ref_size, "absent count")?;
    let total_size = r.read_uint(off_size, "total cells size")?;

    if cell_count == 0 {
        return Err(BocError::InvalidHeader("no cells".to_string()));
    }
    if root_count != 1 {
        return Err(BocError::InvalidHeader(format!(
            "expected exactly one root, found {}",
            root_count
        )));
    }
    if absent_count != 0 {
        return Err(BocError::InvalidHeader(format!("{} absent cells", absent_count)));
    }
    // every cell needs at least its two descriptor bytes
    if cell_count.saturating_mul(2) > total_size {
        return Err(BocError::InvalidHeader(format!(
            "{} cells cannot fit in {} bytes",
            cell_count, total_size
        )));
    }

    let root_index = if generic {
        r.read_uint(ref_size, "root index")?
    } else {
        0
    };
    if root_index >= cell_count {
        return Err(BocError::InvalidHeader(format!("root index {} out of range", root_index)));
    }

    if has_index {
        let index_len = cell_count
            .checked_mul(off_size)
            .ok_or_else(|| BocError::InvalidHeader("index too large".to_string()))?;
        r.read_exact(index_len, "index")?;
    }

    let body = r.read_exact(total_size, "cell data")?;
    let raw = parse_raw_cells(body, cell_count, ref_size)?;

    if has_crc {
        let covered = r.position();
        let stored = u32::from_le_bytes(r.read_array::<4>("crc32c")?);
        let computed = crc32c::crc32c(&bytes[..covered]);
        if stored != computed {
            return Err(BocError::ChecksumMismatch { stored, computed });
        }
    }
    if r.remaining() != 0 {
        return Err(BocError::TrailingBytes(r.remaining()));
    }

    link_cells(raw, root_index)
}

fn parse_raw_cells(body: &[u8], cell_count: usize, ref_size: usize) -> Result<Vec<RawCell<'_>>, BocError> {
    let mut r = ByteReader::new(body);
    let mut cells = Vec::with_capacity(cell_count);

    for index in 0..cell_count {
        let d1 = r.read_u8("cell descriptor")?;
        let d2 = r.read_u8("cell descriptor")?;

        let refs_count = (d1 & 0x07) as usize;
        let exotic = d1 & 0x08 != 0;
        let with_hashes = d1 & 0x10 != 0;
        let level = d1 >> 5;

        if exotic {
            return Err(BocError::UnsupportedExotic(index));
        }
        if refs_count > 4 {
            return Err(BocError::InvalidCell {
                index,
                reason: "more than four references",
            });
        }
        if level != 0 {
            return Err(BocError::InvalidCell {
                index,
                reason: "ordinary cell with non-zero level",
            });
        }
        if with_hashes {
            // one stored hash + depth for a level 0 cell
            r.read_exact(32 + 2, "stored cell hashes")?;
        }

        let data_len = (d2 as usize + 1) / 2;
        let data = r.read_exact(data_len, "cell data")?;
        let bit_len = if d2 % 2 == 0 {
            data_len * 8
        } else {
            let last = data[data_len - 1];
            if last == 0 {
                return Err(BocError::InvalidCell {
                    index,
                    reason: "missing completion tag",
                });
            }
            data_len * 8 - last.trailing_zeros() as usize - 1
        };

        let mut refs = Vec::with_capacity(refs_count);
        for _ in 0..refs_count {
            refs.push(r.read_uint(ref_size, "cell reference")?);
        }

        cells.push(RawCell { data, bit_len, refs });
    }

    if r.remaining() != 0 {
        return Err(BocError::InvalidHeader(format!(
            "{} unused bytes in cell data",
            r.remaining()
        )));
    }
    Ok(cells)
}

/// Resolve reference indices bottom-up; references must always point forward
fn link_cells(raw: Vec<RawCell<'_>>, root_index: usize) -> Result<Arc<Cell>, BocError> {
    let count = raw.len();
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; count];

    for (index, cell) in raw.iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(cell.refs.len());
        for &target in &cell.refs {
            if target <= index || target >= count {
                return Err(BocError::InvalidCell {
                    index,
                    reason: "reference does not point forward",
                });
            }
            let child = built[target].clone().ok_or(BocError::InvalidCell {
                index,
                reason: "unresolved reference",
            })?;
            refs.push(child);
        }
        let linked = Cell::new(cell.data.to_vec(), cell.bit_len, refs)?;
        built[index] = Some(Arc::new(linked));
    }

    built[root_index].take().ok_or(BocError::InvalidCell {
        index: root_index,
        reason: "unresolved root",
    })
}

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Serialize a cell tree in canonical form
pub fn serialize_boc(root: &Arc<Cell>) -> Vec<u8> {
    let order = topological_order(root);
    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash(), i))
        .collect();

    let ref_size = min_bytes(order.len() as u64);
    let mut body = Vec::new();
    for cell in &order {
        body.extend_from_slice(&cell.descriptors());
        body.extend_from_slice(&cell.padded_data());
        for child in cell.refs() {
            write_uint(&mut body, index[&child.hash()] as u64, ref_size);
        }
    }
    let off_size = min_bytes(body.len() as u64);

    let mut out = Vec::with_capacity(body.len() + 32);
    out.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());
    out.push(FLAG_HAS_CRC32C | ref_size as u8);
    out.push(off_size as u8);
    write_uint(&mut out, order.len() as u64, ref_size); // cells
    write_uint(&mut out, 1, ref_size); // roots
    write_uint(&mut out, 0, ref_size); // absent
    write_uint(&mut out, body.len() as u64, off_size);
    write_uint(&mut out, 0, ref_size); // root index
    out.extend_from_slice(&body);

    let crc = crc32c::crc32c(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Parents before children, siblings in reference order, shared cells once
fn topological_order(root: &Arc<Cell>) -> Vec<Arc<Cell>> {
    fn visit(cell: &Arc<Cell>, seen: &mut HashSet<[u8; 32]>, post: &mut Vec<Arc<Cell>>) {
        if !seen.insert(cell.hash()) {
            return;
        }
        for child in cell.refs().iter().rev() {
            visit(child, seen, post);
        }
        post.push(Arc::clone(cell));
    }

    let mut seen = HashSet::new();
    let mut post = Vec::new();
    visit(root, &mut seen, &mut post);
    post.reverse();
    post
}

fn min_bytes(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 7) / 8).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, len: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

// ============================================================================
// BASE64 HELPERS
// ============================================================================

pub fn from_base64(encoded: &str) -> Result<Arc<Cell>, BocError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    deserialize_boc(&bytes)
}

pub fn to_base64(root: &Arc<Cell>) -> String {
    STANDARD.encode(serialize_boc(root))
}
