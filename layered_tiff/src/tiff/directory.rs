use std::collections::BTreeMap;

use anyhow::{bail, ensure, Result};

use common::serde::{Deserializer, Serializer, SliceDeserializer};

/// Field types from TIFF 6.0 section 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    Undefined = 7,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    /// Numerator, denominator pairs.
    Rational(Vec<(u32, u32)>),
    Undefined(Vec<u8>),
}

/// A single image file directory, entries kept sorted by tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directory {
    entries: BTreeMap<u16, Value>,
}

impl FieldType {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            7 => Self::Undefined,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::Undefined => 1,
            Self::Short => 2,
            Self::Long => 4,
            Self::Rational => 8,
        }
    }
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Byte(_) => FieldType::Byte,
            Value::Ascii(_) => FieldType::Ascii,
            Value::Short(_) => FieldType::Short,
            Value::Long(_) => FieldType::Long,
            Value::Rational(_) => FieldType::Rational,
            Value::Undefined(_) => FieldType::Undefined,
        }
    }

    /// Number of values, as stored in the entry's count field.
    pub fn count(&self) -> usize {
        match self {
            Value::Byte(x) | Value::Undefined(x) => x.len(),
            Value::Ascii(x) => x.len() + 1,
            Value::Short(x) => x.len(),
            Value::Long(x) => x.len(),
            Value::Rational(x) => x.len(),
        }
    }

    pub fn byte_size(&self) -> usize {
        self.count() * self.field_type().size()
    }

    pub fn serialize<T: Serializer>(&self, ser: &mut T) {
        match self {
            Value::Byte(x) | Value::Undefined(x) => ser.write_bytes(x),
            Value::Ascii(x) => {
                ser.write_bytes(x.as_bytes());
                ser.write_u8(0);
            }
            Value::Short(x) => x.iter().for_each(|&x| ser.write_u16_le(x)),
            Value::Long(x) => x.iter().for_each(|&x| ser.write_u32_le(x)),
            Value::Rational(x) => x.iter().for_each(|&(n, d)| {
                ser.write_u32_le(n);
                ser.write_u32_le(d);
            }),
        }
    }

    fn deserialize(field_type: FieldType, count: usize, des: &mut SliceDeserializer) -> Self {
        match field_type {
            FieldType::Byte => Value::Byte(des.read_slice(count).to_vec()),
            FieldType::Undefined => Value::Undefined(des.read_slice(count).to_vec()),
            FieldType::Ascii => {
                let bytes = des.read_slice(count);
                let end = bytes.iter().position(|&x| x == 0).unwrap_or(bytes.len());
                Value::Ascii(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            FieldType::Short => Value::Short((0..count).map(|_| des.read_u16_le()).collect()),
            FieldType::Long => Value::Long((0..count).map(|_| des.read_u32_le()).collect()),
            FieldType::Rational => Value::Rational(
                (0..count)
                    .map(|_| (des.read_u32_le(), des.read_u32_le()))
                    .collect(),
            ),
        }
    }

    /// Reads a single numeric value, widening shorts.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Short(x) if x.len() == 1 => Some(x[0] as u32),
            Value::Long(x) if x.len() == 1 => Some(x[0]),
            _ => None,
        }
    }

    pub fn as_u32_vec(&self) -> Option<Vec<u32>> {
        match self {
            Value::Short(x) => Some(x.iter().map(|&x| x as u32).collect()),
            Value::Long(x) => Some(x.clone()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Byte(x) | Value::Undefined(x) => Some(x),
            _ => None,
        }
    }
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `tag`, replacing any value already stored for it.
    pub fn insert(&mut self, tag: u16, value: Value) -> Option<Value> {
        self.entries.insert(tag, value)
    }

    pub fn get(&self, tag: u16) -> Option<&Value> {
        self.entries.get(&tag)
    }

    /// Writes every value that does not fit in an entry, then the directory
    /// itself. Offsets, including the returned one of the directory, count
    /// from `start`, the position of the file header.
    pub fn serialize<T: Serializer>(&self, ser: &mut T, start: usize) -> usize {
        let mut offsets = BTreeMap::new();
        for (&tag, value) in &self.entries {
            if value.byte_size() > 4 {
                ser.pad_to(start, 2);
                offsets.insert(tag, (ser.pos() - start) as u32);
                value.serialize(ser);
            }
        }

        ser.pad_to(start, 2);
        let ifd = ser.pos() - start;
        ser.write_u16_le(self.entries.len() as u16);
        for (&tag, value) in &self.entries {
            ser.write_u16_le(tag);
            ser.write_u16_le(value.field_type() as u16);
            ser.write_u32_le(value.count() as u32);

            match offsets.get(&tag) {
                Some(&offset) => ser.write_u32_le(offset),
                None => {
                    let start = ser.pos();
                    value.serialize(ser);
                    let written = ser.pos() - start;
                    ser.reserve(4 - written);
                }
            }
        }
        ser.write_u32_le(0); // no further directories

        ifd
    }

    /// Parses the directory at `offset` of a little-endian file. Entries of
    /// unsupported types are skipped.
    pub fn deserialize(buf: &[u8], offset: usize) -> Result<Self> {
        let mut des = SliceDeserializer::new(buf);
        des.jump_to(offset);
        ensure!(des.remaining() >= 2, "directory offset {offset} is past the end");

        let count = des.read_u16_le() as usize;
        ensure!(des.remaining() >= count * 12 + 4, "truncated directory");

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let tag = des.read_u16_le();
            let field_type = des.read_u16_le();
            let count = des.read_u32_le() as usize;
            let inline = des.pos();
            des.advance_by(4);

            let Some(field_type) = FieldType::from_u16(field_type) else {
                continue;
            };

            let size = count * field_type.size();
            let start = if size > 4 {
                des.execute_at(inline, |des| des.read_u32_le()) as usize
            } else {
                inline
            };
            ensure!(
                start.saturating_add(size) <= buf.len(),
                "value of tag {tag} lies outside the file"
            );

            let value = des.execute_at(start, |des| Value::deserialize(field_type, count, des));
            entries.insert(tag, value);
        }

        Ok(Self { entries })
    }
}

/// Checks the little-endian header and returns the first directory offset.
pub fn read_header(buf: &[u8]) -> Result<usize> {
    let mut des = SliceDeserializer::new(buf);
    match des.read_slice(2) {
        b"II" => {}
        b"MM" => bail!("big-endian TIFF files are not supported"),
        _ => bail!("not a TIFF file"),
    }
    ensure!(des.read_u16_le() == 42, "not a classic TIFF file");
    Ok(des.read_u32_le() as usize)
}

#[cfg(test)]
mod tests {
    use common::serde::{DynamicSerializer, Serializer};

    use super::{read_header, Directory, FieldType, Value};

    #[test]
    fn inline_and_offset_values() {
        let mut directory = Directory::new();
        directory.insert(258, Value::Short(vec![8, 8, 8]));
        directory.insert(256, Value::Long(vec![10]));
        directory.insert(282, Value::Rational(vec![(720000, 10000)]));

        let mut ser = DynamicSerializer::new();
        ser.write_u8(0xEE); // forces word padding
        let ifd = directory.serialize(&mut ser, 0);
        let bytes = ser.into_inner();

        // BitsPerSample (6 bytes) at 2, XResolution (8 bytes) at 8, IFD at 16.
        assert_eq!(&bytes[2..8], &[8, 0, 8, 0, 8, 0]);
        assert_eq!(&bytes[8..16], &[0x80, 0xFC, 0x0A, 0, 0x10, 0x27, 0, 0]);
        assert_eq!(ifd, 16);
        assert_eq!(&bytes[16..18], &[3, 0]);

        // Entries sorted by tag; ImageWidth inline.
        assert_eq!(&bytes[18..30], &[0, 1, 4, 0, 1, 0, 0, 0, 10, 0, 0, 0]);
        assert_eq!(&bytes[30..42], &[2, 1, 3, 0, 3, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(&bytes[42..54], &[0x1A, 1, 5, 0, 1, 0, 0, 0, 8, 0, 0, 0]);
        assert_eq!(&bytes[54..], &[0, 0, 0, 0]);

        let parsed = Directory::deserialize(&bytes, ifd).unwrap();
        assert_eq!(parsed, directory);
    }

    #[test]
    fn insert_replaces() {
        let mut directory = Directory::new();
        directory.insert(34675, Value::Undefined(vec![1]));
        let old = directory.insert(34675, Value::Undefined(vec![2, 3]));

        assert_eq!(old, Some(Value::Undefined(vec![1])));
        assert_eq!(directory.get(34675).and_then(Value::as_bytes), Some(&[2, 3][..]));
    }

    #[test]
    fn ascii_counts_terminator() {
        let value = Value::Ascii("Layered TIFF".into());
        assert_eq!(value.count(), 13);
        assert_eq!(value.field_type(), FieldType::Ascii);
        assert_eq!(Value::Short(vec![1]).as_u32(), Some(1));
        assert_eq!(Value::Short(vec![1, 2]).as_u32(), None);
    }

    #[test]
    fn header_checks() {
        assert_eq!(read_header(b"II\x2A\0\x08\0\0\0").unwrap(), 8);
        assert!(read_header(b"MM\0\x2A\0\0\0\x08").is_err());
        assert!(read_header(b"GIF89a").is_err());
        assert!(Directory::deserialize(b"II", 100).is_err());
    }
}
