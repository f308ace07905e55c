//! Sizing policy — translate a user-supplied target into the block edge
//! length `D` and the derived block layout (`N`, `T`, `D'`).

use crate::error::{PError, Result};

/// One of the four mutually-exclusive ways a caller can express the desired
/// block size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingMode {
    /// Use this edge length directly (subject to the §3 minimums).
    Dimension(u32),
    /// Aim for roughly this many blocks across the file.
    BlockCount(u64),
    /// Aim for this fraction of the file size as parity overhead, in `(0, 1]`.
    DataUsageRatio(f64),
    /// Guarantee single-byte recovery within every `D*D` window, `(0, 1]`.
    Coverage(f64),
}

/// `ceil(sqrt(x))` over non-negative integers.
pub fn smallest_dim(x: u64) -> u32 {
    if x == 0 {
        return 0;
    }
    let mut d = (x as f64).sqrt().floor() as u64;
    while d * d < x {
        d += 1;
    }
    while d > 1 && (d - 1) * (d - 1) >= x {
        d -= 1;
    }
    d as u32
}

/// Derive the raw block edge length from `mode` and the data file size `s`,
/// before the normalization rules (`D >= 2`, "fits at least one block") are
/// applied. Use [`normalize_dim`] for the final value.
pub fn raw_dim(mode: SizingMode, s: u64) -> Result<u32> {
    match mode {
        SizingMode::Dimension(dim) => Ok(dim),
        SizingMode::BlockCount(count) => {
            if count == 0 {
                return Err(PError::InvalidArgument("block count must be > 0".into()));
            }
            Ok(smallest_dim(s / count))
        }
        SizingMode::DataUsageRatio(ratio) => {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PError::InvalidArgument(format!(
                    "data usage ratio must be in (0, 1], got {ratio}"
                )));
            }
            Ok(smallest_dim((1.0 / ratio).floor() as u64))
        }
        SizingMode::Coverage(cov) => {
            if !(cov > 0.0 && cov <= 1.0) {
                return Err(PError::InvalidArgument(format!(
                    "coverage must be in (0, 1], got {cov}"
                )));
            }
            Ok((2.0 / cov).ceil() as u32)
        }
    }
}

/// Apply the normalization rules to a raw `D`: substitute 2 if too small,
/// substitute `ceil(sqrt(s))` if `s` can't fill even one block at that `D`.
pub fn normalize_dim(dim: u32, s: u64) -> u32 {
    let dim = dim.max(2);
    if s / (dim as u64 * dim as u64) == 0 {
        smallest_dim(s).max(1)
    } else {
        dim
    }
}

/// The fully-derived block layout for a data file of size `s` under block
/// edge length `d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub block_dim: u32,
    pub full_block_count: u64,
    pub tail_len: u64,
    pub last_block_dim: u32,
}

/// Derive the full block layout (`N`, `T`, `D'`) from a normalized `D` and
/// the data file size `s`.
pub fn derive_layout(block_dim: u32, s: u64) -> BlockLayout {
    let cell = block_dim as u64 * block_dim as u64;
    let full_block_count = s / cell;
    let tail_len = s - full_block_count * cell;
    let last_block_dim = if tail_len > 0 {
        smallest_dim(tail_len).min(block_dim)
    } else {
        0
    };
    BlockLayout {
        block_dim,
        full_block_count,
        tail_len,
        last_block_dim,
    }
}

/// Resolve `mode` for a data file of size `s` into the final [`BlockLayout`].
pub fn resolve(mode: SizingMode, s: u64) -> Result<BlockLayout> {
    let raw = raw_dim(mode, s)?;
    let dim = normalize_dim(raw, s);
    Ok(derive_layout(dim, s))
}
