//! Compression of single channel planes inside layer records.

use std::io::{self, Read, Write};

use anyhow::{bail, ensure, Result};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression as Level};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    Raw = 0,
    Rle = 1,
    Zip = 2,
    /// Rows are delta encoded before deflating.
    ZipPredicted = 3,
}

/// Channel identifiers used in layer records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Red,
    Green,
    Blue,
    TransparencyMask,
    Other(i16),
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::Raw,
            1 => Self::Rle,
            2 => Self::Zip,
            3 => Self::ZipPredicted,
            _ => return None,
        })
    }
}

impl ChannelId {
    pub fn from_i16(value: i16) -> Self {
        match value {
            0 => Self::Red,
            1 => Self::Green,
            2 => Self::Blue,
            -1 => Self::TransparencyMask,
            x => Self::Other(x),
        }
    }

    pub fn to_i16(self) -> i16 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::TransparencyMask => -1,
            Self::Other(x) => x,
        }
    }

    /// Index of the matching sample in an RGBA pixel.
    pub fn rgba_index(self) -> Option<usize> {
        Some(match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::TransparencyMask => 3,
            Self::Other(_) => return None,
        })
    }
}

/// Replaces every sample after the first in each row with its difference to
/// the previous one, wrapping on overflow.
pub fn predict(plane: &mut [u8], width: usize) {
    if width == 0 {
        return;
    }

    for row in plane.chunks_exact_mut(width) {
        for i in (1..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - 1]);
        }
    }
}

/// Inverse of [`predict`].
pub fn unpredict(plane: &mut [u8], width: usize) {
    if width == 0 {
        return;
    }

    for row in plane.chunks_exact_mut(width) {
        for i in 1..row.len() {
            row[i] = row[i].wrapping_add(row[i - 1]);
        }
    }
}

pub fn deflate(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Level::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn inflate(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Compresses a `width` samples wide plane with delta prediction followed by
/// zlib.
pub fn encode(plane: &[u8], width: usize, level: u32) -> io::Result<Vec<u8>> {
    let mut plane = plane.to_vec();
    predict(&mut plane, width);
    deflate(&plane, level)
}

/// Restores a plane of `width * height` samples.
pub fn decode(compression: Compression, data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let expected = width * height;
    let plane = match compression {
        Compression::Raw => data.to_vec(),
        Compression::Zip => inflate(data, expected)?,
        Compression::ZipPredicted => {
            let mut plane = inflate(data, expected)?;
            unpredict(&mut plane, width);
            plane
        }
        Compression::Rle => bail!("RLE channel data is not supported"),
    };

    ensure!(
        plane.len() == expected,
        "channel holds {} samples, expected {expected}",
        plane.len()
    );
    Ok(plane)
}
