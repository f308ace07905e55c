//! Block processor — per-block XOR grid, CRC, verification, and repair.
//!
//! # Grid
//! A block of edge length `d` covers `d*d` data bytes (the tail block's `d`
//! may be smaller than the file's nominal `block_dim`; padding beyond the
//! actual byte count is treated as zero and never written back).
//!
//! ```text
//! row[i] = XOR over j in [0, d) of buf[i*d + j]
//! col[j] = XOR over i in [0, d) of buf[i*d + j]
//! crc    = crc32(buf[0..actual_len])
//! ```
//!
//! # Verdict
//! Verification never fails from data contents alone. Every outcome is one
//! of the four [`BlockVerdict`] variants; there is no panicking path through
//! `verify_and_repair`.

use crate::primitives::{crc32, xor_reduce};

/// The parity record stored on disk for one block: `(crc, col, row)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockParity {
    pub crc: u32,
    pub col: Vec<u8>,
    pub row: Vec<u8>,
}

impl BlockParity {
    /// Byte edge length this record was computed over.
    pub fn dim(&self) -> usize {
        self.row.len()
    }

    /// On-disk byte length of this record: `2*dim + 4`.
    pub fn encoded_len(&self) -> usize {
        2 * self.dim() + 4
    }
}

/// Compute the row vector, column vector, and CRC for one block.
///
/// `buf` must be exactly `dim*dim` bytes (zero-padded beyond the block's
/// actual data for a tail block); `actual_len` is the number of genuine data
/// bytes the CRC is computed over (`dim*dim` for a full block, `T` for the
/// tail).
pub fn compute_block_parity(buf: &[u8], dim: usize, actual_len: usize) -> BlockParity {
    assert_eq!(buf.len(), dim * dim, "block buffer must be exactly dim*dim bytes");
    assert!(actual_len <= buf.len());

    let mut row = vec![0u8; dim];
    let mut col = vec![0u8; dim];

    for i in 0..dim {
        row[i] = xor_reduce(buf[i * dim..(i + 1) * dim].iter().copied());
    }
    for j in 0..dim {
        col[j] = xor_reduce((0..dim).map(|i| buf[i * dim + j]));
    }

    BlockParity {
        crc: crc32(&buf[..actual_len]),
        col,
        row,
    }
}

/// Outcome of checking one block's freshly-read data against its stored
/// parity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockVerdict {
    /// CRC matched; the block is intact.
    Ok,
    /// Exactly one row and one column mismatched, but repair was disabled.
    Fixable { row: usize, col: usize },
    /// Exactly one row and one column mismatched; the byte has been
    /// corrected in `buf` and a write at `(block_offset, value)` is pending.
    Fixed { row: usize, col: usize, value: u8 },
    /// CRC mismatched but the error is not confined to a single row+column
    /// intersection (multiple rows/columns disagree, or none do — the latter
    /// implies the stored CRC itself is the corrupt element).
    Unfixable,
}

impl BlockVerdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, BlockVerdict::Ok)
    }
}

/// Verify `buf` (the freshly-read block, `dim*dim` bytes, zero-padded beyond
/// `actual_len` for a tail block) against `stored`, optionally repairing it.
///
/// When `repair` is true and the error is confined to one row+column
/// intersection, `buf` is corrected in place and the verdict carries the
/// corrected byte value so the caller can buffer a positioned write. Indices
/// are scanned smallest-first; exactly one mismatching row and column exist
/// whenever `BlockVerdict::Fixable`/`Fixed` is returned.
pub fn verify_and_repair(buf: &mut [u8], dim: usize, actual_len: usize, stored: &BlockParity, repair: bool) -> BlockVerdict {
    debug_assert_eq!(buf.len(), dim * dim);
    debug_assert_eq!(stored.dim(), dim);

    let crc = crc32(&buf[..actual_len]);
    if crc == stored.crc {
        return BlockVerdict::Ok;
    }

    let mut row = vec![0u8; dim];
    let mut col = vec![0u8; dim];
    for i in 0..dim {
        row[i] = xor_reduce(buf[i * dim..(i + 1) * dim].iter().copied());
    }
    for j in 0..dim {
        col[j] = xor_reduce((0..dim).map(|i| buf[i * dim + j]));
    }

    let mismatched_rows: Vec<usize> = (0..dim).filter(|&i| row[i] != stored.row[i]).collect();
    let mismatched_cols: Vec<usize> = (0..dim).filter(|&j| col[j] != stored.col[j]).collect();

    if mismatched_rows.len() == 1 && mismatched_cols.len() == 1 {
        let fix_row = mismatched_rows[0];
        let fix_col = mismatched_cols[0];

        if !repair {
            return BlockVerdict::Fixable { row: fix_row, col: fix_col };
        }

        let others = xor_reduce((0..dim).filter(|&k| k != fix_col).map(|k| buf[fix_row * dim + k]));
        let corrected = stored.row[fix_row] ^ others;
        buf[fix_row * dim + fix_col] = corrected;

        BlockVerdict::Fixed { row: fix_row, col: fix_col, value: corrected }
    } else {
        BlockVerdict::Unfixable
    }
}
