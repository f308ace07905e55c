//! # pars — parity-file error correction for arbitrary data files
//!
//! Format guarantees:
//! - All numeric fields are little-endian
//! - Every parity file starts with `PARS` and ends with `SRAP`
//! - Corruption confined to a single byte within a block's row+column
//!   intersection is detectable and repairable; anything broader is reported
//!   as [`block::BlockVerdict::Unfixable`]
//! - The whole-file BLAKE3 hash is a correctness shortcut: a match means the
//!   data file is bit-identical to what the parity file was built from, and
//!   the block scan is skipped entirely
//!
//! This crate has no binary entry point. Command-line parsing, directory
//! walking, file watching, and human-readable reporting are left to callers.

pub mod block;
pub mod encoder;
pub mod error;
pub mod format;
pub mod path_util;
pub mod primitives;
pub mod sizing;
pub mod validator;

pub use block::{compute_block_parity, verify_and_repair, BlockParity, BlockVerdict};
pub use encoder::{
    create_parity_with_block_count, create_parity_with_coverage, create_parity_with_data_usage,
    create_parity_with_dimension,
};
pub use error::{PError, Result};
pub use format::{FileHeader, MAGIC_END, MAGIC_START};
pub use primitives::WHOLE_HASH_LEN;
pub use sizing::{BlockLayout, SizingMode};
pub use validator::{validate_parity, ValidationResult};

/// Read and validate a parity file's header without touching its data file.
/// Thin wrapper over [`format::read_header_with_size_check`] for callers that
/// only want the recorded metadata.
pub fn get_parity_header(parity_path: &std::path::Path) -> Result<FileHeader> {
    format::read_header_with_size_check(std::fs::File::open(parity_path)?)
}
