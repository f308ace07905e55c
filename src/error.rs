//! Error taxonomy for the parity-file engine.
//!
//! There is exactly one on-disk format in this crate, so a single
//! `thiserror`-derived enum covers every failure mode in the engine's public
//! surface.
//!
//! Data-file size and hash mismatches are deliberately *not* variants here:
//! both are non-fatal outcomes reported through the fields of
//! [`crate::validator::ValidationResult`] rather than as thrown errors, so
//! `validate_parity` never returns `Err` for them.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parity file magic missing or invalid")]
    ParityMagicMissing,

    #[error("parity file header truncated: expected at least {expected} bytes, file is {actual} bytes")]
    ParityHeaderTruncated { expected: usize, actual: usize },

    #[error("parity file size inconsistent: on-disk size {actual} does not match header-implied size {expected}")]
    ParitySizeInconsistent { expected: u64, actual: u64 },

    #[error("could not allocate a buffer of {0} bytes")]
    OutOfMemory(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PError>;
