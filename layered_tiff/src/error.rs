use std::io;

use image::ColorType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `write`/`encode` was called before any layer was added.
    #[error("no layers were added, refusing to write an empty layered file")]
    EmptyInput,
    #[error("layers must have 3 (RGB) or 4 (RGBA) channels, got {0}")]
    UnsupportedChannels(usize),
    #[error("unsupported image color type {0:?}, expected Rgb8 or Rgba8")]
    UnsupportedColorType(ColorType),
    #[error("sample buffer holds {actual} bytes but {height}x{width}x{channels} needs {expected}")]
    BufferSize {
        height: u32,
        width: u32,
        channels: usize,
        expected: usize,
        actual: usize,
    },
    /// The layer count is stored as a signed 16 bit number.
    #[error("{count} layers do not fit in one file, at most 32767 are supported")]
    TooManyLayers { count: usize },
    #[error("canvas of {height}x{width} pixels has no area")]
    EmptyCanvas { height: u32, width: u32 },
    #[error("failed to build color profile: {0}")]
    Profile(#[from] lcms2::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
