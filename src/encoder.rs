//! Encoder pipeline — produce a parity file for a data file.
//!
//! Four public entry points correspond to the four [`SizingMode`] variants;
//! all of them funnel into [`create_parity`].

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::format::{FileHeader, ParityWriter};
use crate::path_util::relative_to;
use crate::primitives::whole_file_hash;
use crate::sizing::{self, BlockLayout, SizingMode};
use crate::block::compute_block_parity;

/// Build a parity file next to `data_path` sized for roughly `block_count`
/// blocks across the file. `out_path` defaults to `<data_path>.pars`.
pub fn create_parity_with_block_count(data_path: &Path, out_path: Option<&Path>, block_count: u64) -> Result<PathBuf> {
    create_parity(data_path, out_path, SizingMode::BlockCount(block_count))
}

/// Build a parity file sized so total parity overhead is roughly `ratio`
/// times the data file's size, `ratio` in `(0, 1]`.
pub fn create_parity_with_data_usage(data_path: &Path, out_path: Option<&Path>, ratio: f64) -> Result<PathBuf> {
    create_parity(data_path, out_path, SizingMode::DataUsageRatio(ratio))
}

/// Build a parity file guaranteeing single-byte recoverability across at
/// least `coverage` of every block, `coverage` in `(0, 1]`.
pub fn create_parity_with_coverage(data_path: &Path, out_path: Option<&Path>, coverage: f64) -> Result<PathBuf> {
    create_parity(data_path, out_path, SizingMode::Coverage(coverage))
}

/// Build a parity file using an explicit block edge length `dim`.
pub fn create_parity_with_dimension(data_path: &Path, out_path: Option<&Path>, dim: u32) -> Result<PathBuf> {
    create_parity(data_path, out_path, SizingMode::Dimension(dim))
}

/// `<data_path>.pars`, appending rather than replacing any existing
/// extension.
fn default_parity_path(data_path: &Path) -> PathBuf {
    let mut name: OsString = data_path.file_name().unwrap_or_default().to_owned();
    name.push(".pars");
    data_path.with_file_name(name)
}

fn create_parity(data_path: &Path, out_path: Option<&Path>, mode: SizingMode) -> Result<PathBuf> {
    let parity_path = out_path.map(Path::to_path_buf).unwrap_or_else(|| default_parity_path(data_path));

    let data_file = File::open(data_path)?;
    let file_size = data_file.metadata()?.len();

    let layout = sizing::resolve(mode, file_size)?;
    debug!(
        "encoding {:?}: size={} block_dim={} full_block_count={} last_block_dim={}",
        data_path, file_size, layout.block_dim, layout.full_block_count, layout.last_block_dim
    );

    let whole_hash = whole_file_hash(BufReader::new(File::open(data_path)?))?;

    let parity_dir = parity_path.parent().unwrap_or_else(|| Path::new("."));
    let stored_name = relative_to(parity_dir, data_path);

    let header = FileHeader {
        file_size,
        whole_hash,
        block_dim: layout.block_dim,
        full_block_count: layout.full_block_count,
        last_block_dim: layout.last_block_dim,
        file_name: stored_name,
    };

    let out = File::create(&parity_path)?;
    let mut writer = ParityWriter::new(BufWriter::new(out));
    writer.write_header(&header)?;

    write_block_records(data_file, &mut writer, &layout)?;

    writer.write_trailer()?;
    Ok(parity_path)
}

fn write_block_records<W: std::io::Write>(
    mut data_file: File,
    writer: &mut ParityWriter<W>,
    layout: &BlockLayout,
) -> Result<()> {
    data_file.seek(SeekFrom::Start(0))?;
    let mut data_reader = BufReader::new(data_file);

    let cell = layout.block_dim as usize * layout.block_dim as usize;
    let mut buf = vec![0u8; cell];

    for _ in 0..layout.full_block_count {
        data_reader.read_exact(&mut buf)?;
        let parity = compute_block_parity(&buf, layout.block_dim as usize, cell);
        writer.write_block(&parity)?;
    }

    if layout.last_block_dim > 0 {
        let tail_cell = layout.last_block_dim as usize * layout.last_block_dim as usize;
        let mut tail_buf = vec![0u8; tail_cell];
        let n = read_up_to(&mut data_reader, &mut tail_buf)?;
        debug_assert_eq!(n as u64, layout.tail_len);
        let parity = compute_block_parity(&tail_buf, layout.last_block_dim as usize, n);
        writer.write_block(&parity)?;
    }

    Ok(())
}

fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
