use std::fmt::{self, Display};

use image::{DynamicImage, Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Alpha given to every pixel of a layer that arrives without an alpha
/// channel. Half of the sample range, so such layers end up semi-transparent.
pub const DEFAULT_ALPHA: u8 = 128;

/// Logical size of the output image, in pixels.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Canvas {
    pub height: u32,
    pub width: u32,
}

/// Top-left placement of a layer on the canvas. May be negative.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub row: i32,
    pub col: i32,
}

/// Edges of a layer in canvas coordinates. `bottom` and `right` are
/// exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

/// Pixels handed to [`crate::LayerStore::add_layer`], before normalization.
#[derive(Clone, Debug)]
pub enum LayerPixels {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

/// A positioned raster, always RGBA once it is stored.
#[derive(Clone, Debug)]
pub struct Layer {
    pub pixels: RgbaImage,
    pub offset: Offset,
}

impl Canvas {
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn area(&self) -> u64 {
        self.height as u64 * self.width as u64
    }
}

impl From<(u32, u32)> for Canvas {
    fn from((height, width): (u32, u32)) -> Self {
        Self::new(height, width)
    }
}

impl Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

impl Offset {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

impl From<(i32, i32)> for Offset {
    fn from((row, col): (i32, i32)) -> Self {
        Self::new(row, col)
    }
}

impl Rect {
    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }
}

impl LayerPixels {
    /// Wraps a row-major `(height, width, channels)` sample buffer.
    pub fn from_raw(height: u32, width: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = height as usize * width as usize * channels;
        if !matches!(channels, 3 | 4) {
            return Err(Error::UnsupportedChannels(channels));
        }

        if data.len() != expected {
            return Err(Error::BufferSize {
                height,
                width,
                channels,
                expected,
                actual: data.len(),
            });
        }

        // Lengths were checked above, so the buffers always fit.
        Ok(match channels {
            3 => Self::Rgb(RgbImage::from_raw(width, height, data).unwrap_or_default()),
            _ => Self::Rgba(RgbaImage::from_raw(width, height, data).unwrap_or_default()),
        })
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Rgb(_) => Rgb::<u8>::CHANNEL_COUNT as usize,
            Self::Rgba(_) => Rgba::<u8>::CHANNEL_COUNT as usize,
        }
    }

    /// `(height, width)` of the pixel array.
    pub fn shape(&self) -> Canvas {
        let (width, height) = match self {
            Self::Rgb(image) => image.dimensions(),
            Self::Rgba(image) => image.dimensions(),
        };
        Canvas::new(height, width)
    }

    /// Converts to RGBA, filling a missing alpha channel with
    /// [`DEFAULT_ALPHA`]. The color channels are copied unchanged.
    pub fn into_rgba(self) -> RgbaImage {
        match self {
            Self::Rgba(image) => image,
            Self::Rgb(image) => {
                let (width, height) = image.dimensions();
                let data = image
                    .pixels()
                    .flat_map(|&Rgb([r, g, b])| [r, g, b, DEFAULT_ALPHA])
                    .collect();
                RgbaImage::from_raw(width, height, data).unwrap_or_default()
            }
        }
    }
}

impl From<RgbImage> for LayerPixels {
    fn from(image: RgbImage) -> Self {
        Self::Rgb(image)
    }
}

impl From<RgbaImage> for LayerPixels {
    fn from(image: RgbaImage) -> Self {
        Self::Rgba(image)
    }
}

impl TryFrom<DynamicImage> for LayerPixels {
    type Error = Error;

    fn try_from(image: DynamicImage) -> Result<Self> {
        match image {
            DynamicImage::ImageRgb8(image) => Ok(Self::Rgb(image)),
            DynamicImage::ImageRgba8(image) => Ok(Self::Rgba(image)),
            other => Err(Error::UnsupportedColorType(other.color())),
        }
    }
}

impl Layer {
    pub fn shape(&self) -> Canvas {
        Canvas::new(self.pixels.height(), self.pixels.width())
    }

    pub fn rect(&self) -> Rect {
        let Offset { row, col } = self.offset;
        Rect {
            top: row,
            left: col,
            bottom: row.saturating_add(self.pixels.height() as i32),
            right: col.saturating_add(self.pixels.width() as i32),
        }
    }

    /// Copies one channel out of the interleaved pixels, in row-major order.
    pub fn plane(&self, channel: usize) -> Vec<u8> {
        self.pixels.pixels().map(|pixel| pixel.0[channel]).collect()
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage, RgbaImage};

    use super::{Layer, LayerPixels, Offset, Rect, DEFAULT_ALPHA};
    use crate::Error;

    #[test]
    fn rgb_gets_constant_alpha() {
        let image = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 7]));
        let rgba = LayerPixels::from(image.clone()).into_rgba();

        assert_eq!(rgba.dimensions(), (3, 2));
        for (x, y, pixel) in rgba.enumerate_pixels() {
            assert_eq!(&pixel.0[..3], &image.get_pixel(x, y).0);
            assert_eq!(pixel.0[3], DEFAULT_ALPHA);
        }
    }

    #[test]
    fn raw_buffer_validation() {
        assert!(matches!(
            LayerPixels::from_raw(2, 2, 2, vec![0; 8]),
            Err(Error::UnsupportedChannels(2))
        ));
        assert!(matches!(
            LayerPixels::from_raw(2, 2, 4, vec![0; 15]),
            Err(Error::BufferSize { expected: 16, actual: 15, .. })
        ));

        let pixels = LayerPixels::from_raw(2, 5, 3, vec![1; 30]).unwrap();
        assert_eq!(pixels.channels(), 3);
        assert_eq!(pixels.shape().height, 2);
        assert_eq!(pixels.shape().width, 5);
    }

    #[test]
    fn rect_from_offset() {
        let layer = Layer {
            pixels: RgbaImage::new(4, 3),
            offset: Offset::new(-1, 2),
        };

        let rect = layer.rect();
        assert_eq!(
            rect,
            Rect {
                top: -1,
                left: 2,
                bottom: 2,
                right: 6
            }
        );
        assert_eq!((rect.height(), rect.width()), (3, 4));
    }
}
