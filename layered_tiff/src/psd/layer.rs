use anyhow::{ensure, Context, Result};
use bitflags::bitflags;

use common::serde::{Deserializer, Serializer, SliceDeserializer};

use crate::{
    channel::{ChannelId, Compression},
    psd::{
        key, read_pascal_string, read_tagged_block, read_unicode_string, write_pascal_string,
        write_tagged_block, write_unicode_string, PsdFormat,
    },
    Rect,
};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LayerFlags: u8 {
        const TRANSPARENCY_PROTECTED = 1 << 0;
        const HIDDEN = 1 << 1;
        const OBSOLETE = 1 << 2;
        const PHOTOSHOP5 = 1 << 3;
        const IRRELEVANT = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    PassThrough,
    Normal,
    Dissolve,
    Darken,
    Multiply,
    Lighten,
    Screen,
    Overlay,
    Other([u8; 4]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Clipping {
    Base = 0,
    NonBase = 1,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub compression: Compression,
    /// Compressed samples, without the compression field.
    pub data: Vec<u8>,
}

/// One layer of the `Layr` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerRecord {
    pub name: String,
    pub rect: Rect,
    pub channels: Vec<Channel>,
    pub blend_mode: BlendMode,
    /// 0 is transparent, 255 is opaque.
    pub opacity: u8,
    pub clipping: Clipping,
    pub flags: LayerFlags,
}

impl BlendMode {
    pub fn key(self) -> [u8; 4] {
        match self {
            Self::PassThrough => *b"pass",
            Self::Normal => *b"norm",
            Self::Dissolve => *b"diss",
            Self::Darken => *b"dark",
            Self::Multiply => *b"mul ",
            Self::Lighten => *b"lite",
            Self::Screen => *b"scrn",
            Self::Overlay => *b"over",
            Self::Other(key) => key,
        }
    }

    pub fn from_key(key: [u8; 4]) -> Self {
        match &key {
            b"pass" => Self::PassThrough,
            b"norm" => Self::Normal,
            b"diss" => Self::Dissolve,
            b"dark" => Self::Darken,
            b"mul " => Self::Multiply,
            b"lite" => Self::Lighten,
            b"scrn" => Self::Screen,
            b"over" => Self::Overlay,
            _ => Self::Other(key),
        }
    }
}

impl Channel {
    /// Bytes this channel takes up in the channel data section.
    pub fn size(&self) -> usize {
        self.data.len() + 2
    }
}

impl LayerRecord {
    /// A visible, fully opaque layer with normal blending and locked
    /// transparency.
    pub fn new(name: impl Into<String>, rect: Rect, channels: Vec<Channel>) -> Self {
        Self {
            name: name.into(),
            rect,
            channels,
            blend_mode: BlendMode::Normal,
            opacity: 255,
            clipping: Clipping::Base,
            flags: LayerFlags::PHOTOSHOP5 | LayerFlags::TRANSPARENCY_PROTECTED,
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    /// Writes the record itself. Channel data follows all records and is
    /// written by [`LayerRecord::serialize_channel_data`].
    pub fn serialize<T: Serializer>(&self, ser: &mut T, format: PsdFormat) {
        let Rect {
            top,
            left,
            bottom,
            right,
        } = self.rect;
        for edge in [top, left, bottom, right] {
            format.write_u32(ser, edge as u32);
        }

        format.write_u16(ser, self.channels.len() as u16);
        for channel in &self.channels {
            format.write_u16(ser, channel.id.to_i16() as u16);
            format.write_u32(ser, channel.size() as u32);
        }

        ser.write_bytes(&format.signature());
        format.write_code(ser, self.blend_mode.key());
        ser.write_u8(self.opacity);
        ser.write_u8(self.clipping as u8);
        ser.write_u8(self.flags.bits());
        ser.write_u8(0);

        let extra = ser.reserve(4);
        let start = ser.pos();
        format.write_u32(ser, 0); // layer mask
        format.write_u32(ser, 0); // blending ranges
        write_pascal_string(ser, &self.name, 4);
        write_tagged_block(ser, format, key::UNICODE_LAYER_NAME, 2, |ser| {
            write_unicode_string(ser, format, &self.name)
        });

        let size = (ser.pos() - start) as u32;
        ser.execute_at(extra, |ser| format.write_u32(ser, size));
    }

    pub fn serialize_channel_data<T: Serializer>(&self, ser: &mut T, format: PsdFormat) {
        for channel in &self.channels {
            format.write_u16(ser, channel.compression as u16);
            ser.write_bytes(&channel.data);
        }
    }

    /// Reads a record. Channels come back with their sizes reserved but no
    /// data; [`LayerRecord::deserialize_channel_data`] fills them in.
    pub fn deserialize(des: &mut SliceDeserializer, format: PsdFormat) -> Result<(Self, Vec<usize>)> {
        ensure!(des.remaining() >= 18, "truncated layer record");
        let [top, left, bottom, right] = [(); 4].map(|_| format.read_u32(des) as i32);
        let rect = Rect {
            top,
            left,
            bottom,
            right,
        };
        ensure!(bottom >= top && right >= left, "inverted layer rectangle {rect:?}");

        let channel_count = format.read_u16(des) as usize;
        ensure!(des.remaining() >= channel_count * 6, "truncated channel table");
        let mut channels = Vec::with_capacity(channel_count);
        let mut sizes = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            let id = ChannelId::from_i16(format.read_u16(des) as i16);
            sizes.push(format.read_u32(des) as usize);
            channels.push(Channel {
                id,
                compression: Compression::Raw,
                data: Vec::new(),
            });
        }

        ensure!(des.remaining() >= 16, "truncated blend data");
        let signature = des.read_array::<4>();
        ensure!(signature == format.signature(), "bad blend mode signature");
        let blend_mode = BlendMode::from_key(format.read_code(des));
        let opacity = des.read_u8();
        let clipping = match des.read_u8() {
            0 => Clipping::Base,
            _ => Clipping::NonBase,
        };
        let flags = LayerFlags::from_bits_retain(des.read_u8());
        des.advance_by(1);

        let extra_size = format.read_u32(des) as usize;
        ensure!(des.remaining() >= extra_size, "truncated layer extra data");
        let mut extra = SliceDeserializer::new(des.read_slice(extra_size));

        let mask_size = format.read_u32(&mut extra) as usize;
        extra.advance_by(mask_size);
        let ranges_size = format.read_u32(&mut extra) as usize;
        extra.advance_by(ranges_size);
        let mut name = read_pascal_string(&mut extra, 4);

        while extra.remaining() >= 12 {
            let (key, data) = read_tagged_block(&mut extra, format)?;
            if key == key::UNICODE_LAYER_NAME {
                name = read_unicode_string(&mut SliceDeserializer::new(data), format)?;
            }
        }

        let record = Self {
            name,
            rect,
            channels,
            blend_mode,
            opacity,
            clipping,
            flags,
        };
        Ok((record, sizes))
    }

    pub fn deserialize_channel_data(
        &mut self,
        des: &mut SliceDeserializer,
        format: PsdFormat,
        sizes: &[usize],
    ) -> Result<()> {
        for (channel, &size) in self.channels.iter_mut().zip(sizes) {
            ensure!(size >= 2, "channel {:?} is missing its compression", channel.id);
            ensure!(des.remaining() >= size, "truncated channel data");

            let compression = format.read_u16(des);
            channel.compression = Compression::from_u16(compression)
                .with_context(|| format!("unknown channel compression {compression}"))?;
            channel.data = des.read_slice(size - 2).to_vec();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::serde::{DynamicSerializer, SliceDeserializer};

    use super::{BlendMode, Channel, Clipping, LayerFlags, LayerRecord};
    use crate::{
        channel::{ChannelId, Compression},
        psd::PsdFormat,
        Rect,
    };

    fn record() -> LayerRecord {
        let channels = [ChannelId::TransparencyMask, ChannelId::Red]
            .into_iter()
            .map(|id| Channel {
                id,
                compression: Compression::ZipPredicted,
                data: vec![0xAB; 3],
            })
            .collect();
        let rect = Rect {
            top: 1,
            left: 2,
            bottom: 3,
            right: 4,
        };
        LayerRecord::new("layer_0", rect, channels)
    }

    #[test]
    fn record_layout_little_endian() {
        let mut ser = DynamicSerializer::new();
        record().serialize(&mut ser, PsdFormat::LittleEndian32);
        let bytes = ser.into_inner();

        assert_eq!(&bytes[0..16], &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0]);
        assert_eq!(&bytes[16..18], &[2, 0]);
        // alpha: id -1, 5 bytes; red: id 0, 5 bytes
        assert_eq!(&bytes[18..24], &[0xFF, 0xFF, 5, 0, 0, 0]);
        assert_eq!(&bytes[24..30], &[0, 0, 5, 0, 0, 0]);
        assert_eq!(&bytes[30..38], b"MIB8mron");
        // opacity, clipping, flags, filler
        assert_eq!(&bytes[38..42], &[255, 0, 0x09, 0]);

        // mask + ranges + "\x07layer_0" + luni block (12 + 4 + 14)
        let extra = u32::from_le_bytes(bytes[42..46].try_into().unwrap());
        assert_eq!(extra, 4 + 4 + 8 + 12 + 18);
        assert_eq!(bytes.len(), 46 + extra as usize);
        assert_eq!(&bytes[46..54], &[0; 8]);
        assert_eq!(&bytes[54..62], b"\x07layer_0");
        assert_eq!(&bytes[62..70], b"MIB8inul");
        assert_eq!(&bytes[70..74], &[18, 0, 0, 0]);
        assert_eq!(&bytes[74..78], &[7, 0, 0, 0]);
        assert_eq!(&bytes[78..80], &[b'l', 0]);
    }

    #[test]
    fn record_round_trip() {
        for format in [PsdFormat::BigEndian32, PsdFormat::LittleEndian32] {
            let original = record();
            let mut ser = DynamicSerializer::new();
            original.serialize(&mut ser, format);
            original.serialize_channel_data(&mut ser, format);
            let bytes = ser.into_inner();

            let mut des = SliceDeserializer::new(&bytes);
            let (mut parsed, sizes) = LayerRecord::deserialize(&mut des, format).unwrap();
            assert_eq!(sizes, [5, 5]);
            parsed.deserialize_channel_data(&mut des, format, &sizes).unwrap();

            assert_eq!(parsed, original);
            assert_eq!(parsed.blend_mode, BlendMode::Normal);
            assert_eq!(parsed.clipping, Clipping::Base);
            assert!(parsed.flags.contains(LayerFlags::TRANSPARENCY_PROTECTED));
            assert!(parsed.channel(ChannelId::Green).is_none());
        }
    }

    #[test]
    fn unicode_name_wins() {
        let mut original = record();
        original.name = "Ebene ü".into();
        let mut ser = DynamicSerializer::new();
        original.serialize(&mut ser, PsdFormat::BigEndian32);
        let bytes = ser.into_inner();

        let mut des = SliceDeserializer::new(&bytes);
        let (parsed, _) = LayerRecord::deserialize(&mut des, PsdFormat::BigEndian32).unwrap();
        assert_eq!(parsed.name, "Ebene ü");
    }

    #[test]
    fn blend_mode_keys() {
        assert_eq!(BlendMode::from_key(*b"mul "), BlendMode::Multiply);
        assert_eq!(BlendMode::from_key(*b"hLit"), BlendMode::Other(*b"hLit"));
        assert_eq!(BlendMode::Other(*b"hLit").key(), *b"hLit");
    }
}
