use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use common::serde::{Deserializer, DynamicSerializer, Serializer, SliceDeserializer};

use crate::{
    psd::{key, read_tagged_block, write_tagged_block, LayerRecord, PsdFormat},
    Error,
};

const SIGNATURE: &[u8] = b"Adobe Photoshop Document Data Block\0";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ColorSpace {
    Rgb = 0,
    Hsb = 1,
    Cmyk = 2,
    Lab = 7,
    Grayscale = 8,
}

/// Color and opacity used by editors to preview a mask.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskColor {
    pub color_space: ColorSpace,
    pub components: [u16; 4],
    /// Percent, 0 to 100.
    pub opacity: u16,
}

/// Global blocks following the user mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InfoBlock {
    /// A block with a key and no data.
    Empty([u8; 4]),
    FilterMask(MaskColor),
    Unknown { key: [u8; 4], data: Vec<u8> },
}

/// Contents of the TIFF ImageSourceData tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSourceData {
    pub format: PsdFormat,
    pub layers: Vec<LayerRecord>,
    /// Negative layer counts mark the first alpha channel as the merged
    /// image's transparency.
    pub has_transparency: bool,
    pub user_mask: Option<MaskColor>,
    pub info: Vec<InfoBlock>,
}

impl ColorSpace {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::Rgb,
            1 => Self::Hsb,
            2 => Self::Cmyk,
            7 => Self::Lab,
            8 => Self::Grayscale,
            _ => return None,
        })
    }
}

impl MaskColor {
    /// Half transparent red.
    pub const RED: Self = Self {
        color_space: ColorSpace::Rgb,
        components: [65535, 0, 0, 0],
        opacity: 50,
    };

    fn serialize<T: Serializer>(&self, ser: &mut T, format: PsdFormat) {
        format.write_u16(ser, self.color_space as u16);
        for component in self.components {
            format.write_u16(ser, component);
        }
        format.write_u16(ser, self.opacity);
    }

    fn deserialize(des: &mut SliceDeserializer, format: PsdFormat) -> Result<Self> {
        ensure!(des.remaining() >= 12, "truncated mask color");
        let color_space = format.read_u16(des);
        let color_space = ColorSpace::from_u16(color_space)
            .with_context(|| format!("unknown color space {color_space}"))?;
        let components = [(); 4].map(|_| format.read_u16(des));
        let opacity = format.read_u16(des);

        Ok(Self {
            color_space,
            components,
            opacity,
        })
    }
}

impl InfoBlock {
    pub fn key(&self) -> [u8; 4] {
        match self {
            Self::Empty(key) | Self::Unknown { key, .. } => *key,
            Self::FilterMask(_) => key::FILTER_MASK,
        }
    }

    fn serialize<T: Serializer>(&self, ser: &mut T, format: PsdFormat) {
        write_tagged_block(ser, format, self.key(), 4, |ser| match self {
            Self::Empty(_) => {}
            Self::FilterMask(color) => color.serialize(ser, format),
            Self::Unknown { data, .. } => ser.write_bytes(data),
        });
    }
}

/// `layers` as the signed count stored at the start of the `Layr` block.
pub fn layer_count(layers: usize) -> crate::Result<i16> {
    i16::try_from(layers).map_err(|_| Error::TooManyLayers { count: layers })
}

impl ImageSourceData {
    pub fn new(format: PsdFormat, layers: Vec<LayerRecord>) -> Self {
        Self {
            format,
            layers,
            has_transparency: false,
            user_mask: None,
            info: Vec::new(),
        }
    }

    pub fn serialize<T: Serializer>(&self, ser: &mut T) -> crate::Result<()> {
        let format = self.format;
        let count = layer_count(self.layers.len())?;
        let count = if self.has_transparency { -count } else { count };
        ser.write_bytes(SIGNATURE);

        write_tagged_block(ser, format, key::LAYER, 4, |ser| {
            let start = ser.pos();
            format.write_u16(ser, count as u16);

            for layer in &self.layers {
                layer.serialize(ser, format);
            }
            for layer in &self.layers {
                layer.serialize_channel_data(ser, format);
            }
            ser.pad_to(start, 2);
        });

        if let Some(mask) = &self.user_mask {
            write_tagged_block(ser, format, key::USER_MASK, 4, |ser| {
                mask.serialize(ser, format);
                ser.write_u8(128); // flag
            });
        }

        for block in &self.info {
            block.serialize(ser, format);
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        let mut ser = DynamicSerializer::new();
        self.serialize(&mut ser)?;
        Ok(ser.into_inner())
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        let mut des = SliceDeserializer::new(buf);
        ensure!(
            des.read_slice(SIGNATURE.len()) == SIGNATURE,
            "missing image source data signature"
        );

        let pos = des.pos();
        let signature = des.execute_at(pos, |des| des.read_array::<4>());
        let format = PsdFormat::from_signature(signature)
            .with_context(|| format!("unsupported block signature {signature:?}"))?;
        let mut this = Self::new(format, Vec::new());

        while !des.is_eof() {
            let (key, data) = read_tagged_block(&mut des, format)?;
            let mut block = SliceDeserializer::new(data);
            match key {
                key::LAYER => this.deserialize_layers(&mut block)?,
                key::USER_MASK => this.user_mask = Some(MaskColor::deserialize(&mut block, format)?),
                key::FILTER_MASK => this
                    .info
                    .push(InfoBlock::FilterMask(MaskColor::deserialize(&mut block, format)?)),
                _ if data.is_empty() => this.info.push(InfoBlock::Empty(key)),
                _ => this.info.push(InfoBlock::Unknown {
                    key,
                    data: data.to_vec(),
                }),
            }
        }

        Ok(this)
    }

    fn deserialize_layers(&mut self, des: &mut SliceDeserializer) -> Result<()> {
        let count = self.format.read_u16(des) as i16;
        self.has_transparency = count < 0;

        let mut records = Vec::new();
        for i in 0..count.unsigned_abs() {
            let record = LayerRecord::deserialize(des, self.format)
                .with_context(|| format!("layer record {i}"))?;
            records.push(record);
        }

        for (i, (record, sizes)) in records.iter_mut().enumerate() {
            record
                .deserialize_channel_data(des, self.format, sizes)
                .with_context(|| format!("channel data of layer {i}"))?;
        }

        self.layers = records.into_iter().map(|(record, _)| record).collect();
        Ok(())
    }
}
