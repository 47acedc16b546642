//! Turns a finalized [`LayerStore`](crate::LayerStore) into a layered TIFF
//! and reads such files back.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{ensure, Context};
use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use common::serde::DynamicSerializer;

use crate::{
    channel::{self, ChannelId, Compression},
    psd::{key, layer_count, Channel, ImageSourceData, InfoBlock, LayerRecord},
    store::{Finalized, NamedLayer},
    tiff::{self, tag, Directory, Value},
    Canvas, EncoderConfig, Error, Rect, Result,
};

/// Order in which layer channels are written.
const CHANNEL_ORDER: [ChannelId; 4] = [
    ChannelId::TransparencyMask,
    ChannelId::Red,
    ChannelId::Green,
    ChannelId::Blue,
];

pub struct Encoder<'a> {
    config: &'a EncoderConfig,
}

/// A layered TIFF decoded by [`read_layers`].
#[derive(Debug)]
pub struct LayeredFile {
    pub canvas: Canvas,
    /// The primary raster, with opaque alpha if it was written as RGB.
    pub composite: RgbaImage,
    pub source: ImageSourceData,
    pub layers: Vec<DecodedLayer>,
}

#[derive(Debug)]
pub struct DecodedLayer {
    pub name: String,
    pub rect: Rect,
    pub pixels: RgbaImage,
}

impl<'a> Encoder<'a> {
    pub fn new(config: &'a EncoderConfig) -> Self {
        Self { config }
    }

    /// Builds the whole file in memory.
    pub fn encode(&self, finalized: &Finalized) -> Result<Vec<u8>> {
        if finalized.layers.is_empty() {
            return Err(Error::EmptyInput);
        }

        layer_count(finalized.layers.len())?;

        let Canvas { height, width } = finalized.canvas;
        if finalized.canvas.area() == 0 {
            return Err(Error::EmptyCanvas { height, width });
        }

        let source = self.source_data(finalized)?;
        let samples = if self.config.composite_alpha { 4 } else { 3 };
        let raster = composite_samples(&finalized.composite, samples);

        let row_bytes = width as usize * samples;
        let rows_per_strip = tiff::rows_per_strip(row_bytes, height, self.config.strip_size);
        let strips =
            tiff::compress_strips(&raster, row_bytes, rows_per_strip, self.config.deflate_level)?;

        let mut directory = self.directory(finalized.canvas, samples as u16, rows_per_strip);
        if let Some(icc) = self.config.color_profile.icc()? {
            directory.insert(tag::INTER_COLOR_PROFILE, Value::Undefined(icc));
        }
        directory.insert(tag::IMAGE_SOURCE_DATA, Value::Undefined(source.to_bytes()?));

        let mut ser = DynamicSerializer::new();
        tiff::serialize(&mut ser, directory, &strips);
        Ok(ser.into_inner())
    }

    /// Encodes and writes to `path`. Nothing is created if encoding fails.
    pub fn write(&self, finalized: &Finalized, path: &Path) -> Result<()> {
        let bytes = self.encode(finalized)?;

        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&bytes)?;
        file.flush()?;

        info!(
            "Wrote {} layers ({}) to {} [{} bytes]",
            finalized.layers.len(),
            finalized.canvas,
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    /// The record of one layer with all four channels compressed.
    pub fn layer_record(&self, layer: &NamedLayer) -> Result<LayerRecord> {
        let width = layer.layer.pixels.width() as usize;
        let channels = CHANNEL_ORDER
            .into_iter()
            .filter_map(|id| Some((id, id.rgba_index()?)))
            .map(|(id, index)| -> Result<Channel> {
                let plane = layer.layer.plane(index);
                Ok(Channel {
                    id,
                    compression: Compression::ZipPredicted,
                    data: channel::encode(&plane, width, self.config.deflate_level)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "{}: {:?} -> {} bytes",
            layer.name,
            layer.rect,
            channels.iter().map(Channel::size).sum::<usize>()
        );
        Ok(LayerRecord::new(layer.name.clone(), layer.rect, channels))
    }

    pub fn source_data(&self, finalized: &Finalized) -> Result<ImageSourceData> {
        let layers = (finalized.layers.iter())
            .map(|x| self.layer_record(x))
            .collect::<Result<_>>()?;

        let mut source = ImageSourceData::new(self.config.psd_format, layers);
        source.user_mask = Some(self.config.user_mask);
        source.info = vec![
            InfoBlock::Empty(key::PATTERNS),
            InfoBlock::FilterMask(self.config.filter_mask),
        ];
        Ok(source)
    }

    fn directory(&self, canvas: Canvas, samples: u16, rows_per_strip: u32) -> Directory {
        let config = self.config;
        let mut directory = Directory::new();

        directory.insert(tag::NEW_SUBFILE_TYPE, Value::Long(vec![0]));
        directory.insert(tag::IMAGE_WIDTH, Value::Long(vec![canvas.width]));
        directory.insert(tag::IMAGE_LENGTH, Value::Long(vec![canvas.height]));
        directory.insert(tag::BITS_PER_SAMPLE, Value::Short(vec![8; samples as usize]));
        directory.insert(tag::COMPRESSION, Value::Short(vec![tag::value::ADOBE_DEFLATE]));
        directory.insert(
            tag::PHOTOMETRIC_INTERPRETATION,
            Value::Short(vec![tag::value::PHOTOMETRIC_RGB]),
        );
        directory.insert(tag::SAMPLES_PER_PIXEL, Value::Short(vec![samples]));
        directory.insert(tag::ROWS_PER_STRIP, Value::Long(vec![rows_per_strip]));
        directory.insert(tag::X_RESOLUTION, Value::Rational(vec![config.resolution.x]));
        directory.insert(tag::Y_RESOLUTION, Value::Rational(vec![config.resolution.y]));
        directory.insert(
            tag::PLANAR_CONFIGURATION,
            Value::Short(vec![tag::value::PLANAR_CHUNKY]),
        );
        directory.insert(
            tag::RESOLUTION_UNIT,
            Value::Short(vec![config.resolution.unit as u16]),
        );

        if samples == 4 {
            directory.insert(
                tag::EXTRA_SAMPLES,
                Value::Short(vec![tag::value::EXTRA_SAMPLE_UNASSOCIATED_ALPHA]),
            );
        }

        directory
    }
}

fn composite_samples(composite: &RgbaImage, samples: usize) -> Vec<u8> {
    match samples {
        4 => composite.as_raw().clone(),
        _ => (composite.pixels())
            .flat_map(|Rgba([r, g, b, _])| [*r, *g, *b])
            .collect(),
    }
}

/// Parses a file written by [`Encoder`], restoring the composite and every
/// layer's pixels.
pub fn read_layers(buf: &[u8]) -> anyhow::Result<LayeredFile> {
    let directory = Directory::deserialize(buf, tiff::read_header(buf)?)?;
    let get = |tag: u16| {
        (directory.get(tag))
            .and_then(Value::as_u32)
            .with_context(|| format!("missing tag {tag}"))
    };

    let canvas = Canvas::new(get(tag::IMAGE_LENGTH)?, get(tag::IMAGE_WIDTH)?);
    let samples = get(tag::SAMPLES_PER_PIXEL)? as usize;
    ensure!(
        matches!(samples, 3 | 4),
        "unsupported samples per pixel {samples}"
    );

    let raster = tiff::read_strips(buf, &directory)?;
    ensure!(
        raster.len() as u64 == canvas.area() * samples as u64,
        "primary raster holds {} bytes, expected {}",
        raster.len(),
        canvas.area() * samples as u64
    );
    let data = match samples {
        4 => raster,
        _ => (raster.chunks_exact(3))
            .flat_map(|x| [x[0], x[1], x[2], 255])
            .collect(),
    };
    let composite = RgbaImage::from_raw(canvas.width, canvas.height, data)
        .context("composite does not match its dimensions")?;

    let source = (directory.get(tag::IMAGE_SOURCE_DATA))
        .and_then(Value::as_bytes)
        .context("file has no layer data")?;
    let source = ImageSourceData::deserialize(source)?;

    let layers = (source.layers.iter())
        .map(|record| {
            decode_layer(record).with_context(|| format!("failed to decode {}", record.name))
        })
        .collect::<anyhow::Result<_>>()?;

    Ok(LayeredFile {
        canvas,
        composite,
        source,
        layers,
    })
}

fn decode_layer(record: &LayerRecord) -> anyhow::Result<DecodedLayer> {
    let (width, height) = (record.rect.width(), record.rect.height());
    let mut pixels = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));

    for channel in &record.channels {
        let Some(index) = channel.id.rgba_index() else {
            continue;
        };

        let plane = channel::decode(
            channel.compression,
            &channel.data,
            width as usize,
            height as usize,
        )?;
        for (pixel, sample) in pixels.pixels_mut().zip(plane) {
            pixel.0[index] = sample;
        }
    }

    Ok(DecodedLayer {
        name: record.name.clone(),
        rect: record.rect,
        pixels,
    })
}
