use serde::{Deserialize, Serialize};

use crate::psd::{MaskColor, PsdFormat};

/// Everything about the output file that is not derived from the layers.
/// Built per call and only ever read by the encoder.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub psd_format: PsdFormat,
    pub user_mask: MaskColor,
    pub filter_mask: MaskColor,
    pub resolution: Resolution,
    /// zlib level used for strips and layer channels, 0 to 9.
    pub deflate_level: u32,
    /// Target uncompressed size of one strip in bytes.
    pub strip_size: usize,
    pub color_profile: ColorProfile,
    /// Write the composite with its alpha channel as an extra sample.
    pub composite_alpha: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Pixels per unit as numerator, denominator.
    pub x: (u32, u32),
    pub y: (u32, u32),
    pub unit: ResolutionUnit,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ResolutionUnit {
    None = 1,
    Inch = 2,
    Centimeter = 3,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum ColorProfile {
    #[default]
    Srgb,
    None,
    /// Raw ICC profile bytes.
    Custom(Vec<u8>),
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            psd_format: PsdFormat::LittleEndian32,
            user_mask: MaskColor::RED,
            filter_mask: MaskColor::RED,
            resolution: Resolution::default(),
            deflate_level: 6,
            strip_size: 65_536,
            color_profile: ColorProfile::Srgb,
            composite_alpha: true,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            x: (720_000, 10_000),
            y: (720_000, 10_000),
            unit: ResolutionUnit::Inch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColorProfile, EncoderConfig, ResolutionUnit};
    use crate::psd::PsdFormat;

    #[test]
    fn defaults() {
        let config = EncoderConfig::default();
        assert_eq!(config.psd_format, PsdFormat::LittleEndian32);
        assert_eq!(config.resolution.x, (720_000, 10_000));
        assert_eq!(config.resolution.unit as u16, 2);
        assert_eq!(config.resolution.unit, ResolutionUnit::Inch);
        assert_eq!(config.color_profile, ColorProfile::Srgb);
        assert_eq!(config.user_mask, config.filter_mask);
        assert_eq!(config.user_mask.opacity, 50);
    }
}
