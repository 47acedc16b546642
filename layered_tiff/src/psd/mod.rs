//! The layer description Photoshop embeds in TIFF files.
//!
//! ## References
//!
//! - https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/
//! - TIFF Technical Note for Adobe Photoshop, tag 37724 (ImageSourceData)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use common::serde::{Deserializer, Serializer, SliceDeserializer};

mod layer;
mod source_data;

pub use layer::{BlendMode, Channel, Clipping, LayerFlags, LayerRecord};
pub use source_data::{layer_count, ColorSpace, ImageSourceData, InfoBlock, MaskColor};

/// Four character codes of the tagged blocks this crate reads and writes.
pub mod key {
    pub const LAYER: [u8; 4] = *b"Layr";
    pub const USER_MASK: [u8; 4] = *b"LMsk";
    pub const PATTERNS: [u8; 4] = *b"Patt";
    pub const FILTER_MASK: [u8; 4] = *b"FMsk";
    pub const UNICODE_LAYER_NAME: [u8; 4] = *b"luni";
}

/// Byte order of the block. Little-endian files store every integer and
/// every four character code reversed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PsdFormat {
    BigEndian32,
    #[default]
    LittleEndian32,
}

impl PsdFormat {
    pub fn signature(self) -> [u8; 4] {
        self.code(*b"8BIM")
    }

    /// A four character code as it appears in the file.
    pub fn code(self, code: [u8; 4]) -> [u8; 4] {
        match self {
            Self::BigEndian32 => code,
            Self::LittleEndian32 => {
                let [a, b, c, d] = code;
                [d, c, b, a]
            }
        }
    }

    pub fn from_signature(signature: [u8; 4]) -> Option<Self> {
        [Self::BigEndian32, Self::LittleEndian32]
            .into_iter()
            .find(|format| format.signature() == signature)
    }

    pub fn write_u16<T: Serializer>(self, ser: &mut T, data: u16) {
        match self {
            Self::BigEndian32 => ser.write_u16_be(data),
            Self::LittleEndian32 => ser.write_u16_le(data),
        }
    }

    pub fn write_u32<T: Serializer>(self, ser: &mut T, data: u32) {
        match self {
            Self::BigEndian32 => ser.write_u32_be(data),
            Self::LittleEndian32 => ser.write_u32_le(data),
        }
    }

    pub fn write_code<T: Serializer>(self, ser: &mut T, code: [u8; 4]) {
        ser.write_bytes(&self.code(code));
    }

    pub fn read_u16<T: Deserializer>(self, des: &mut T) -> u16 {
        match self {
            Self::BigEndian32 => des.read_u16_be(),
            Self::LittleEndian32 => des.read_u16_le(),
        }
    }

    pub fn read_u32<T: Deserializer>(self, des: &mut T) -> u32 {
        match self {
            Self::BigEndian32 => des.read_u32_be(),
            Self::LittleEndian32 => des.read_u32_le(),
        }
    }

    pub fn read_code<T: Deserializer>(self, des: &mut T) -> [u8; 4] {
        self.code(des.read_array())
    }

    fn utf16_bytes(self, unit: u16) -> [u8; 2] {
        match self {
            Self::BigEndian32 => unit.to_be_bytes(),
            Self::LittleEndian32 => unit.to_le_bytes(),
        }
    }
}

/// Writes `signature key length data`, padding the data to `align` bytes.
/// The length covers the padding.
pub fn write_tagged_block<T: Serializer>(
    ser: &mut T,
    format: PsdFormat,
    key: [u8; 4],
    align: usize,
    data: impl FnOnce(&mut T),
) {
    ser.write_bytes(&format.signature());
    format.write_code(ser, key);

    let length = ser.reserve(4);
    let start = ser.pos();
    data(ser);
    ser.pad_to(start, align);

    let size = (ser.pos() - start) as u32;
    ser.execute_at(length, |ser| format.write_u32(ser, size));
}

/// Reads the next tagged block, returning its key and data.
pub fn read_tagged_block<'a>(
    des: &mut SliceDeserializer<'a>,
    format: PsdFormat,
) -> Result<([u8; 4], &'a [u8])> {
    ensure!(des.remaining() >= 12, "truncated tagged block header");
    let signature = des.read_array::<4>();
    ensure!(
        signature == format.signature(),
        "bad tagged block signature {signature:?}"
    );

    let key = format.read_code(des);
    let length = format.read_u32(des) as usize;
    ensure!(
        des.remaining() >= length,
        "tagged block {:?} claims {length} bytes, {} left",
        String::from_utf8_lossy(&key),
        des.remaining()
    );

    Ok((key, des.read_slice(length)))
}

/// Length prefixed byte string, padded so the whole thing (prefix included)
/// is a multiple of `align` bytes. Longer names are cut at 255 bytes.
pub fn write_pascal_string<T: Serializer>(ser: &mut T, value: &str, align: usize) {
    let bytes = &value.as_bytes()[..value.len().min(255)];
    let start = ser.pos();
    ser.write_u8(bytes.len() as u8);
    ser.write_bytes(bytes);
    ser.pad_to(start, align);
}

pub fn read_pascal_string<T: Deserializer>(des: &mut T, align: usize) -> String {
    let start = des.pos();
    let length = des.read_u8() as usize;
    let value = String::from_utf8_lossy(&des.read_bytes(length)).into_owned();

    let read = des.pos() - start;
    des.advance_by((align - read % align) % align);
    value
}

/// `u32` count of UTF-16 code units followed by the units.
pub fn write_unicode_string<T: Serializer>(ser: &mut T, format: PsdFormat, value: &str) {
    let units = value.encode_utf16().collect::<Vec<_>>();
    format.write_u32(ser, units.len() as u32);
    for unit in units {
        ser.write_bytes(&format.utf16_bytes(unit));
    }
}

pub fn read_unicode_string<T: Deserializer>(des: &mut T, format: PsdFormat) -> Result<String> {
    let count = format.read_u32(des) as usize;
    ensure!(des.remaining() >= count * 2, "truncated unicode string");

    let units = (0..count).map(|_| format.read_u16(des)).collect::<Vec<_>>();
    Ok(String::from_utf16_lossy(&units))
}
