//! Minimal little-endian baseline TIFF: one directory, chunky 8-bit samples
//! stored in strips.

use std::io;

use anyhow::{bail, ensure, Context, Result};

use common::serde::Serializer;

use crate::channel::{deflate, inflate};

mod directory;
pub mod tag;

pub use directory::{read_header, Directory, FieldType, Value};

/// Splits interleaved samples into strips of `rows_per_strip` rows and
/// deflates each one.
pub fn compress_strips(
    data: &[u8],
    row_bytes: usize,
    rows_per_strip: u32,
    level: u32,
) -> io::Result<Vec<Vec<u8>>> {
    let strip_bytes = (row_bytes * rows_per_strip.max(1) as usize).max(1);
    data.chunks(strip_bytes)
        .map(|strip| deflate(strip, level))
        .collect()
}

/// Number of rows per strip so a strip holds about `target` bytes, never
/// less than one row.
pub fn rows_per_strip(row_bytes: usize, height: u32, target: usize) -> u32 {
    let rows = target / row_bytes.max(1);
    (rows as u32).clamp(1, height.max(1))
}

/// Writes header, strips and `directory`. The strip offset and byte count
/// entries are filled in here. Every offset in the file is relative to the
/// position of the header.
pub fn serialize<T: Serializer>(ser: &mut T, mut directory: Directory, strips: &[Vec<u8>]) {
    let start = ser.pos();
    ser.write_bytes(b"II");
    ser.write_u16_le(42);
    let ifd_offset = ser.reserve(4);

    let mut offsets = Vec::with_capacity(strips.len());
    for strip in strips {
        offsets.push((ser.pos() - start) as u32);
        ser.write_bytes(strip);
    }

    let counts = strips.iter().map(|x| x.len() as u32).collect();
    directory.insert(tag::STRIP_OFFSETS, Value::Long(offsets));
    directory.insert(tag::STRIP_BYTE_COUNTS, Value::Long(counts));

    let ifd = directory.serialize(ser, start) as u32;
    ser.execute_at(ifd_offset, |ser| ser.write_u32_le(ifd));
}

/// Reassembles the decompressed sample data of a directory's strips.
pub fn read_strips(buf: &[u8], directory: &Directory) -> Result<Vec<u8>> {
    let get = |tag: u16| {
        directory
            .get(tag)
            .and_then(Value::as_u32_vec)
            .with_context(|| format!("missing tag {tag}"))
    };

    let offsets = get(tag::STRIP_OFFSETS)?;
    let counts = get(tag::STRIP_BYTE_COUNTS)?;
    ensure!(offsets.len() == counts.len(), "strip tables differ in length");

    let compression = (directory.get(tag::COMPRESSION))
        .and_then(Value::as_u32)
        .unwrap_or(1);

    let mut out = Vec::new();
    for (&offset, &count) in offsets.iter().zip(&counts) {
        let (offset, count) = (offset as usize, count as usize);
        let strip = buf
            .get(offset..offset + count)
            .with_context(|| format!("strip at {offset} lies outside the file"))?;

        match compression {
            1 => out.extend_from_slice(strip),
            x if x == tag::value::ADOBE_DEFLATE as u32 || x == tag::value::DEFLATE as u32 => {
                out.extend(inflate(strip, count)?)
            }
            x => bail!("unsupported compression {x}"),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use common::serde::{DynamicSerializer, Serializer};

    use super::{compress_strips, read_header, read_strips, rows_per_strip, serialize, tag, Directory, Value};

    #[test]
    fn strip_sizing() {
        assert_eq!(rows_per_strip(3000, 100, 65536), 21);
        assert_eq!(rows_per_strip(100_000, 100, 65536), 1);
        assert_eq!(rows_per_strip(4, 10, 65536), 10);
    }

    #[test]
    fn strips_round_trip() {
        let data = (0..=255u8).cycle().take(6 * 5).collect::<Vec<_>>();
        let strips = compress_strips(&data, 6, 2, 6).unwrap();
        assert_eq!(strips.len(), 3);

        let mut directory = Directory::new();
        directory.insert(tag::COMPRESSION, Value::Short(vec![8]));

        let mut ser = DynamicSerializer::new();
        serialize(&mut ser, directory, &strips);
        let bytes = ser.into_inner();

        let ifd = read_header(&bytes).unwrap();
        let parsed = Directory::deserialize(&bytes, ifd).unwrap();
        let offsets = parsed.get(tag::STRIP_OFFSETS).and_then(Value::as_u32_vec).unwrap();
        assert_eq!(offsets[0], 8);
        assert_eq!(read_strips(&bytes, &parsed).unwrap(), data);
    }

    #[test]
    fn offsets_relative_to_header() {
        let data = vec![7u8; 4 * 3];
        let strips = compress_strips(&data, 3, 4, 6).unwrap();

        let mut directory = Directory::new();
        directory.insert(tag::COMPRESSION, Value::Short(vec![8]));
        directory.insert(tag::BITS_PER_SAMPLE, Value::Short(vec![8, 8, 8]));

        // Something already in the buffer before the file starts.
        let mut ser = DynamicSerializer::new();
        ser.write_bytes(&[0xAA; 3]);
        serialize(&mut ser, directory, &strips);
        let bytes = ser.into_inner();
        let file = &bytes[3..];

        let parsed = Directory::deserialize(file, read_header(file).unwrap()).unwrap();
        assert_eq!(parsed.get(tag::BITS_PER_SAMPLE), Some(&Value::Short(vec![8, 8, 8])));
        assert_eq!(read_strips(file, &parsed).unwrap(), data);
    }
}
