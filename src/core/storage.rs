//! Chunked binary image for checkpointing field state.
//!
//! Layout: `MAGIC`, `u32` version, then chunks of
//! `tag: [u8; 4] | len: u32 | uncompressed_len: u32 | lz4 block`.
//! Readers skip unknown tags.

use std::io::{self, Read, Write};

use crate::grid::{Field, Grid};

pub const MAGIC: &[u8; 8] = b"TAUFLD01";
pub const VERSION_V1: u32 = 1;
pub const VERSION_CURRENT: u32 = VERSION_V1;

pub const TAG_GRID: [u8; 4] = *b"GRID";
pub const TAG_PRNG: [u8; 4] = *b"PRNG";
pub const TAG_STAT: [u8; 4] = *b"STAT";
pub const TAG_FIELD_A: [u8; 4] = *b"FLDA";
pub const TAG_FIELD_B: [u8; 4] = *b"FLDB";
pub const TAG_FIELD_N: [u8; 4] = *b"FLDN";
pub const TAG_FIELD_TAU: [u8; 4] = *b"FTAU";

pub fn compress_lz4(input: &[u8]) -> Vec<u8> {
    lz4_flex::compress(input)
}

pub fn decompress_lz4(input: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    lz4_flex::decompress(input, expected_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_f64_le<R: Read>(r: &mut R) -> io::Result<f64> {
    Ok(f64::from_le_bytes(read_exact::<8, _>(r)?))
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Write one chunk: payload is LZ4-compressed and preceded by its uncompressed length.
pub fn write_chunk_lz4<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    let uncompressed_len =
        u32::try_from(payload.len()).map_err(|_| invalid("chunk too large"))?;
    let total_len = 4u32.saturating_add(
        u32::try_from(compressed.len()).map_err(|_| invalid("chunk too large"))?,
    );

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

/// Read the next chunk header. `None` means the image ended cleanly on a
/// chunk boundary; a header cut short is an error.
pub fn read_chunk_header<R: Read>(r: &mut R) -> io::Result<Option<([u8; 4], u32)>> {
    let mut tag = [0u8; 4];
    let mut filled = 0;
    while filled < tag.len() {
        match r.read(&mut tag[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated chunk header",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let len = read_u32_le(r)?;
    Ok(Some((tag, len)))
}

/// Upper bound on the LZ4 block size for `n` input bytes.
fn lz4_bound(n: usize) -> usize {
    n.saturating_add(n / 10).saturating_add(21)
}

/// Read the body of a chunk whose header was just consumed; returns the
/// decompressed payload.
///
/// `max_len` caps the claimed uncompressed size so a corrupt header cannot
/// force a huge allocation.
pub fn read_chunk_payload<R: Read>(r: &mut R, len: u32, max_len: usize) -> io::Result<Vec<u8>> {
    let mut take = r.by_ref().take(len as u64);
    let uncompressed_len = read_u32_le(&mut take)? as usize;
    let compressed_len = (len as usize).saturating_sub(4);
    if uncompressed_len > max_len || compressed_len > lz4_bound(max_len) {
        return Err(invalid("chunk larger than the grid allows"));
    }
    let mut compressed = Vec::with_capacity(compressed_len);
    take.read_to_end(&mut compressed)?;
    if compressed.len() + 4 != len as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated chunk",
        ));
    }
    decompress_lz4(&compressed, uncompressed_len)
}

pub fn write_header<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)?;
    write_u32_le(w, VERSION_CURRENT)
}

pub fn read_header<R: Read>(r: &mut R) -> io::Result<()> {
    let magic = read_exact::<8, _>(r)?;
    if &magic != MAGIC {
        return Err(invalid("bad field image magic"));
    }
    if read_u32_le(r)? != VERSION_CURRENT {
        return Err(invalid("unsupported field image version"));
    }
    Ok(())
}

pub fn grid_payload(grid: &Grid) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&(grid.ny as u32).to_le_bytes());
    buf.extend_from_slice(&(grid.nx as u32).to_le_bytes());
    buf.extend_from_slice(&grid.dx.to_le_bytes());
    buf.extend_from_slice(&grid.dy.to_le_bytes());
    buf
}

pub fn read_grid_payload<R: Read>(r: &mut R) -> io::Result<Grid> {
    let ny = read_u32_le(r)? as usize;
    let nx = read_u32_le(r)? as usize;
    let dx = read_f64_le(r)?;
    let dy = read_f64_le(r)?;
    let grid = Grid { ny, nx, dx, dy };
    grid.validate().map_err(|_| invalid("invalid GRID chunk"))?;
    Ok(grid)
}

pub fn field_payload(field: &Field) -> Vec<u8> {
    let (ny, nx) = field.shape();
    let mut buf = Vec::with_capacity(8 + field.as_slice().len() * 8);
    buf.extend_from_slice(&(ny as u32).to_le_bytes());
    buf.extend_from_slice(&(nx as u32).to_le_bytes());
    for v in field.as_slice() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

pub fn read_field_payload<R: Read>(r: &mut R) -> io::Result<Field> {
    let ny = read_u32_le(r)? as usize;
    let nx = read_u32_le(r)? as usize;
    let len = ny
        .checked_mul(nx)
        .ok_or_else(|| invalid("field dimensions overflow"))?;
    // Grows as values arrive; the stored dimensions are not trusted for sizing.
    let mut data = Vec::new();
    for _ in 0..len {
        data.push(read_f64_le(r)?);
    }
    Field::from_vec(ny, nx, data).ok_or_else(|| invalid("field length mismatch"))
}
