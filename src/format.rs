//! Format layer — parity-file header, trailer, and block-record framing.
//!
//! Write order (bit-exact): `PARS`, `file_size`, `whole_hash`, `block_dim`,
//! `full_block_count`, `last_block_dim`, `file_name_length`, `file_name`,
//! then one `(crc, col[D], row[D])` record per block in order, then `SRAP`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};

use crate::block::BlockParity;
use crate::error::{PError, Result};
use crate::primitives::{pack_u16, pack_u32, pack_u64, unpack_u16, unpack_u32, unpack_u64, WHOLE_HASH_LEN};

pub const MAGIC_START: &[u8; 4] = b"PARS";
pub const MAGIC_END: &[u8; 4] = b"SRAP";

/// Bytes from offset 0 through `file_name_length` inclusive, before the
/// variable-length file name: `4 + 8 + 32 + 4 + 8 + 4 + 2`.
pub const FIXED_HEADER_LEN: usize = 4 + 8 + WHOLE_HASH_LEN + 4 + 8 + 4 + 2;

/// The parity-file header, minus the trailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub file_size: u64,
    pub whole_hash: [u8; WHOLE_HASH_LEN],
    pub block_dim: u32,
    pub full_block_count: u64,
    pub last_block_dim: u32,
    pub file_name: String,
}

impl FileHeader {
    /// The parity-file size this header implies:
    /// `30 + H + L + (2D+4)N + (D'>0 ? 2D'+4 : 0) + 4`.
    pub fn expected_parity_file_size(&self) -> u64 {
        let fixed = FIXED_HEADER_LEN as u64 + self.file_name.len() as u64;
        let full_records = (2 * self.block_dim as u64 + 4) * self.full_block_count;
        let tail_record = if self.last_block_dim > 0 {
            2 * self.last_block_dim as u64 + 4
        } else {
            0
        };
        fixed + full_records + tail_record + 4
    }

    fn encode_fixed(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FIXED_HEADER_LEN + self.file_name.len());
        buf.extend_from_slice(MAGIC_START);
        buf.extend_from_slice(&pack_u64(self.file_size));
        buf.extend_from_slice(&self.whole_hash);
        buf.extend_from_slice(&pack_u32(self.block_dim));
        buf.extend_from_slice(&pack_u64(self.full_block_count));
        buf.extend_from_slice(&pack_u32(self.last_block_dim));
        buf.extend_from_slice(&pack_u16(self.file_name.len() as u16));
        buf.extend_from_slice(self.file_name.as_bytes());
        buf
    }
}

/// Sequential writer for the parity-file format: header, then blocks in
/// order, then trailer. Callers must call the three phases in order exactly
/// once each.
pub struct ParityWriter<W: Write> {
    w: W,
}

impl<W: Write> ParityWriter<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn write_header(&mut self, header: &FileHeader) -> io::Result<()> {
        self.w.write_all(&header.encode_fixed())
    }

    pub fn write_block(&mut self, parity: &BlockParity) -> io::Result<()> {
        self.w.write_all(&pack_u32(parity.crc))?;
        self.w.write_all(&parity.col)?;
        self.w.write_all(&parity.row)?;
        Ok(())
    }

    pub fn write_trailer(&mut self) -> io::Result<()> {
        self.w.write_all(MAGIC_END)
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

/// Read and validate a parity-file header from an already-open reader,
/// without checking the trailer or the total on-disk size.
///
/// Used internally by [`read_header_with_size_check`]; exposed separately so
/// the validator can reuse the parsed header after it has already confirmed
/// the trailer and size itself.
pub fn read_header<R: Read>(mut r: R) -> Result<FileHeader> {
    let mut magic = [0u8; 4];
    read_exact_truncating(&mut r, &mut magic, 4)?;
    if &magic != MAGIC_START {
        return Err(PError::ParityMagicMissing);
    }

    let mut file_size_buf = [0u8; 8];
    read_exact_truncating(&mut r, &mut file_size_buf, FIXED_HEADER_LEN)?;
    let file_size = unpack_u64(&file_size_buf)?;

    let mut whole_hash = [0u8; WHOLE_HASH_LEN];
    read_exact_truncating(&mut r, &mut whole_hash, FIXED_HEADER_LEN)?;

    let mut block_dim_buf = [0u8; 4];
    read_exact_truncating(&mut r, &mut block_dim_buf, FIXED_HEADER_LEN)?;
    let block_dim = unpack_u32(&block_dim_buf)?;

    let mut full_block_count_buf = [0u8; 8];
    read_exact_truncating(&mut r, &mut full_block_count_buf, FIXED_HEADER_LEN)?;
    let full_block_count = unpack_u64(&full_block_count_buf)?;

    let mut last_block_dim_buf = [0u8; 4];
    read_exact_truncating(&mut r, &mut last_block_dim_buf, FIXED_HEADER_LEN)?;
    let last_block_dim = unpack_u32(&last_block_dim_buf)?;

    let mut name_len_buf = [0u8; 2];
    read_exact_truncating(&mut r, &mut name_len_buf, FIXED_HEADER_LEN)?;
    let name_len = unpack_u16(&name_len_buf)? as usize;

    let mut name_buf = vec![0u8; name_len];
    read_exact_truncating(&mut r, &mut name_buf, FIXED_HEADER_LEN + name_len)?;
    let file_name = String::from_utf8_lossy(&name_buf).into_owned();

    Ok(FileHeader {
        file_size,
        whole_hash,
        block_dim,
        full_block_count,
        last_block_dim,
        file_name,
    })
}

fn read_exact_truncating<R: Read>(r: &mut R, buf: &mut [u8], expected_at_least: usize) -> Result<()> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(PError::ParityHeaderTruncated {
            expected: expected_at_least,
            actual: 0, // the caller (read_header_with_size_check) knows the real on-disk size
        }),
        Err(e) => Err(e.into()),
    }
}

/// Read the header of a parity file, validating the start magic, the end
/// magic, and the total on-disk size against the header's implied size.
/// This is the read-side entry point used by both `get_parity_header` and
/// the validator's header-read step.
pub fn read_header_with_size_check<R: Read + Seek>(mut r: R) -> Result<FileHeader> {
    let actual_len = r.seek(SeekFrom::End(0))?;
    if actual_len < 4 {
        return Err(PError::ParityHeaderTruncated {
            expected: FIXED_HEADER_LEN,
            actual: actual_len as usize,
        });
    }

    r.seek(SeekFrom::Start(actual_len - 4))?;
    let mut end_magic = [0u8; 4];
    r.read_exact(&mut end_magic)?;
    if &end_magic != MAGIC_END {
        return Err(PError::ParityMagicMissing);
    }

    r.seek(SeekFrom::Start(0))?;
    let header = read_header(&mut r).map_err(|e| match e {
        PError::ParityHeaderTruncated { expected, .. } => PError::ParityHeaderTruncated {
            expected,
            actual: actual_len as usize,
        },
        other => other,
    })?;

    let expected_len = header.expected_parity_file_size();
    if expected_len != actual_len {
        return Err(PError::ParitySizeInconsistent {
            expected: expected_len,
            actual: actual_len,
        });
    }

    Ok(header)
}

/// Sequential block-record reader, positioned immediately after the header
/// by the caller (see [`read_header_with_size_check`] plus a seek to
/// `FIXED_HEADER_LEN + file_name_length`).
pub struct ParityBlockReader<R: Read> {
    r: R,
}

impl<R: Read> ParityBlockReader<R> {
    pub fn new(r: R) -> Self {
        Self { r }
    }

    pub fn read_block(&mut self, dim: usize) -> io::Result<BlockParity> {
        let mut crc_buf = [0u8; 4];
        self.r.read_exact(&mut crc_buf)?;
        let crc = unpack_u32(&crc_buf)?;

        let mut col = vec![0u8; dim];
        self.r.read_exact(&mut col)?;
        let mut row = vec![0u8; dim];
        self.r.read_exact(&mut row)?;

        Ok(BlockParity { crc, col, row })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header(block_dim: u32, full_block_count: u64, last_block_dim: u32, name: &str) -> FileHeader {
        FileHeader {
            file_size: 1234,
            whole_hash: [0x11u8; WHOLE_HASH_LEN],
            block_dim,
            full_block_count,
            last_block_dim,
            file_name: name.to_string(),
        }
    }

    #[test]
    fn header_roundtrip_no_tail() {
        let header = sample_header(4, 16, 0, "data.bin");
        let mut buf = Vec::new();
        {
            let mut w = ParityWriter::new(&mut buf);
            w.write_header(&header).unwrap();
        }
        let parsed = read_header(Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn full_file_size_invariant_matches_scenario_s3() {
        let header = sample_header(8, 4, 7, "data.bin");
        // 30 + 32 + 8("data.bin".len()) + (2*8+4)*4 + (2*7+4) + 4
        let expected = 30 + 32 + 8 + 80 + 18 + 4;
        assert_eq!(header.expected_parity_file_size(), expected);
    }

    #[test]
    fn end_to_end_header_and_trailer_validate() {
        let header = sample_header(4, 2, 0, "x");
        let mut buf = Vec::new();
        {
            let mut w = ParityWriter::new(&mut buf);
            w.write_header(&header).unwrap();
            // two dummy block records of dim 4: 4+4+4 = 12 bytes each
            for _ in 0..2 {
                w.write_block(&BlockParity { crc: 0, col: vec![0; 4], row: vec![0; 4] }).unwrap();
            }
            w.write_trailer().unwrap();
        }
        let parsed = read_header_with_size_check(Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn missing_start_magic_is_rejected() {
        let mut buf = vec![0u8; 100];
        buf[96..100].copy_from_slice(MAGIC_END);
        let err = read_header_with_size_check(Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, PError::ParityMagicMissing));
    }

    #[test]
    fn missing_end_magic_is_rejected() {
        let header = sample_header(4, 1, 0, "a");
        let mut buf = Vec::new();
        {
            let mut w = ParityWriter::new(&mut buf);
            w.write_header(&header).unwrap();
            w.write_block(&BlockParity { crc: 0, col: vec![0; 4], row: vec![0; 4] }).unwrap();
            // no trailer written
        }
        let err = read_header_with_size_check(Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, PError::ParityMagicMissing));
    }

    #[test]
    fn size_inconsistency_is_detected() {
        let header = sample_header(4, 1, 0, "a");
        let mut buf = Vec::new();
        {
            let mut w = ParityWriter::new(&mut buf);
            w.write_header(&header).unwrap();
            // Missing the block record entirely before the trailer.
            w.write_trailer().unwrap();
        }
        let err = read_header_with_size_check(Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, PError::ParitySizeInconsistent { .. }));
    }
}
