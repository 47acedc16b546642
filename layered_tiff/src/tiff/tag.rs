//! Tag numbers of the entries this crate writes.

pub const NEW_SUBFILE_TYPE: u16 = 254;
pub const IMAGE_WIDTH: u16 = 256;
pub const IMAGE_LENGTH: u16 = 257;
pub const BITS_PER_SAMPLE: u16 = 258;
pub const COMPRESSION: u16 = 259;
pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;
pub const STRIP_OFFSETS: u16 = 273;
pub const SAMPLES_PER_PIXEL: u16 = 277;
pub const ROWS_PER_STRIP: u16 = 278;
pub const STRIP_BYTE_COUNTS: u16 = 279;
pub const X_RESOLUTION: u16 = 282;
pub const Y_RESOLUTION: u16 = 283;
pub const PLANAR_CONFIGURATION: u16 = 284;
pub const RESOLUTION_UNIT: u16 = 296;
pub const EXTRA_SAMPLES: u16 = 338;
pub const INTER_COLOR_PROFILE: u16 = 34675;
pub const IMAGE_SOURCE_DATA: u16 = 37724;

pub mod value {
    /// Compression: zlib, "Adobe Deflate".
    pub const ADOBE_DEFLATE: u16 = 8;
    /// Compression: the pre-6.0 code for the same zlib stream.
    pub const DEFLATE: u16 = 32946;
    pub const PHOTOMETRIC_RGB: u16 = 2;
    pub const PLANAR_CHUNKY: u16 = 1;
    pub const EXTRA_SAMPLE_UNASSOCIATED_ALPHA: u16 = 2;
}
