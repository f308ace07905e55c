//! Codec primitives — little-endian packing, CRC-32, XOR reduction, and the
//! streaming whole-file hash.
//!
//! # Endianness
//! Every numeric field in the parity-file format is little-endian, encoded
//! here with `byteorder` over an in-memory cursor. This is frozen; a
//! big-endian variant would need a distinct magic number, which this crate
//! does not define.

use std::io::{self, Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32Hasher;

/// Byte length of the whole-file hash. Pinned to BLAKE3's native digest size;
/// the on-disk format supports exactly one width, not a negotiated one.
pub const WHOLE_HASH_LEN: usize = 32;

/// Streaming chunk size for the whole-file hash pass.
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

pub fn pack_u16(v: u16) -> [u8; 2] {
    let mut buf = [0u8; 2];
    {
        let mut w: &mut [u8] = &mut buf;
        w.write_u16::<LittleEndian>(v).expect("fixed-size buffer");
    }
    buf
}

pub fn pack_u32(v: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    {
        let mut w: &mut [u8] = &mut buf;
        w.write_u32::<LittleEndian>(v).expect("fixed-size buffer");
    }
    buf
}

pub fn pack_u64(v: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    {
        let mut w: &mut [u8] = &mut buf;
        w.write_u64::<LittleEndian>(v).expect("fixed-size buffer");
    }
    buf
}

pub fn unpack_u16(bytes: &[u8]) -> io::Result<u16> {
    Cursor::new(bytes).read_u16::<LittleEndian>()
}

pub fn unpack_u32(bytes: &[u8]) -> io::Result<u32> {
    Cursor::new(bytes).read_u32::<LittleEndian>()
}

pub fn unpack_u64(bytes: &[u8]) -> io::Result<u64> {
    Cursor::new(bytes).read_u64::<LittleEndian>()
}

/// CRC-32/IEEE over a byte span. Identical output to a table-driven
/// implementation; used for per-block integrity checks.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut h = Crc32Hasher::new();
    h.update(bytes);
    h.finalize()
}

/// XOR of every byte in `bytes`. Used both row-wise and column-wise by the
/// block processor.
pub fn xor_reduce(bytes: impl IntoIterator<Item = u8>) -> u8 {
    bytes.into_iter().fold(0u8, |acc, b| acc ^ b)
}

/// Stream `reader` through a BLAKE3 digest in [`HASH_CHUNK_SIZE`]-byte chunks
/// until EOF, returning the 32-byte digest.
///
/// The digest identifies "bit-identical data file"; collisions are not a
/// security concern here, only a correctness shortcut (a match short-circuits
/// the validator's block scan).
pub fn whole_file_hash<R: Read>(mut reader: R) -> io::Result<[u8; WHOLE_HASH_LEN]> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(*hasher.finalize().as_bytes())
}
