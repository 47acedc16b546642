//! Packs positioned RGBA layers into a single TIFF that generic viewers show
//! as a flattened image and layer-aware editors open as separate layers.
//!
//! ```no_run
//! use image::RgbaImage;
//! use layered_tiff::LayerStore;
//!
//! let mut store = LayerStore::new(None);
//! store.add_layer(RgbaImage::new(64, 64), (0, 0));
//! store.add_layer(RgbaImage::new(32, 32), (16, 16));
//! store.write("out.tif")?;
//! # Ok::<(), layered_tiff::Error>(())
//! ```

pub mod channel;
pub mod composite;
pub mod config;
pub mod encoder;
mod error;
mod icc;
mod layer;
pub mod psd;
mod store;
pub mod tiff;
mod warning;

pub use config::{ColorProfile, EncoderConfig, Resolution, ResolutionUnit};
pub use encoder::{read_layers, DecodedLayer, Encoder, LayeredFile};
pub use error::{Error, Result};
pub use icc::srgb_profile;
pub use layer::{Canvas, Layer, LayerPixels, Offset, Rect, DEFAULT_ALPHA};
pub use store::{layer_name, Finalized, LayerStore, NamedLayer, WriteReport};
pub use warning::Warning;
