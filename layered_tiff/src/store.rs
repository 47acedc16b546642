use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::warn;

use crate::{
    composite::overlay, encoder::Encoder, warning::Warning, Canvas, EncoderConfig, Error, Layer,
    LayerPixels, Offset, Rect, Result,
};

/// Ordered collection of positioned layers on a canvas.
#[derive(Default)]
pub struct LayerStore {
    canvas: Option<Canvas>,
    layers: Vec<Layer>,
    warnings: Vec<Warning>,
}

/// Everything the encoder needs, computed from the store at write time.
pub struct Finalized<'a> {
    pub canvas: Canvas,
    pub layers: Vec<NamedLayer<'a>>,
    pub composite: RgbaImage,
}

pub struct NamedLayer<'a> {
    pub name: String,
    pub rect: Rect,
    pub layer: &'a Layer,
}

/// Outcome of a successful [`LayerStore::write`].
#[derive(Debug)]
pub struct WriteReport {
    pub path: PathBuf,
    /// Notices raised while layers were added, in order.
    pub warnings: Vec<Warning>,
}

impl LayerStore {
    /// Creates a store. With `canvas` unset, the first layer's size is used.
    pub fn new(canvas: Option<Canvas>) -> Self {
        Self {
            canvas,
            ..Default::default()
        }
    }

    pub fn with_canvas(height: u32, width: u32) -> Self {
        Self::new(Some(Canvas::new(height, width)))
    }

    pub fn canvas(&self) -> Option<Canvas> {
        self.canvas
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Appends a layer at `offset`. Three channel input gets a constant alpha
    /// plane and a size different from the canvas is only reported; neither
    /// stops the layer from being stored as is.
    pub fn add_layer(&mut self, pixels: impl Into<LayerPixels>, offset: impl Into<Offset>) {
        let (pixels, offset) = (pixels.into(), offset.into());
        let index = self.layers.len();

        if pixels.channels() == 3 {
            self.notice(Warning::MissingAlpha { layer: index });
        }

        let layer_shape = pixels.shape();
        match self.canvas {
            None => self.canvas = Some(layer_shape),
            Some(canvas) if canvas != layer_shape => self.notice(Warning::ShapeMismatch {
                layer: index,
                layer_shape,
                canvas,
            }),
            Some(_) => {}
        }

        self.layers.push(Layer {
            pixels: pixels.into_rgba(),
            offset,
        });
    }

    /// Names every layer by position and flattens the stack.
    pub fn finalize(&self) -> Result<Finalized<'_>> {
        let canvas = match self.canvas {
            Some(canvas) if !self.layers.is_empty() => canvas,
            _ => return Err(Error::EmptyInput),
        };

        let layers = (self.layers.iter().enumerate())
            .map(|(i, layer)| NamedLayer {
                name: layer_name(i),
                rect: layer.rect(),
                layer,
            })
            .collect();

        Ok(Finalized {
            canvas,
            layers,
            composite: overlay(canvas, &self.layers),
        })
    }

    /// Writes the layered file with the default [`EncoderConfig`].
    pub fn write(&self, path: impl AsRef<Path>) -> Result<WriteReport> {
        self.write_with(path, &EncoderConfig::default())
    }

    pub fn write_with(&self, path: impl AsRef<Path>, config: &EncoderConfig) -> Result<WriteReport> {
        let path = path.as_ref();
        Encoder::new(config).write(&self.finalize()?, path)?;

        Ok(WriteReport {
            path: path.to_path_buf(),
            warnings: self.warnings.clone(),
        })
    }

    fn notice(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }
}

pub fn layer_name(index: usize) -> String {
    format!("layer_{index}")
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use proptest::prelude::*;

    use super::LayerStore;
    use crate::{Canvas, Error, Offset, Warning, DEFAULT_ALPHA};

    #[test]
    fn canvas_inferred_from_first_layer() {
        let mut store = LayerStore::new(None);
        store.add_layer(RgbaImage::new(7, 3), (0, 0));
        store.add_layer(RgbaImage::new(7, 3), (1, 1));

        assert_eq!(store.canvas(), Some(Canvas::new(3, 7)));
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn mismatch_is_stored_unchanged() {
        let mut store = LayerStore::with_canvas(4, 4);
        store.add_layer(RgbaImage::new(6, 2), (0, 0));

        assert_eq!(store.canvas(), Some(Canvas::new(4, 4)));
        assert_eq!(store.layers()[0].pixels.dimensions(), (6, 2));
        assert_eq!(
            store.warnings(),
            [Warning::ShapeMismatch {
                layer: 0,
                layer_shape: Canvas::new(2, 6),
                canvas: Canvas::new(4, 4),
            }]
        );
    }

    #[test]
    fn rgb_layer_is_normalized() {
        let mut store = LayerStore::new(None);
        store.add_layer(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])), Offset::default());

        let layer = &store.layers()[0];
        assert!(layer.pixels.pixels().all(|p| p.0 == [1, 2, 3, DEFAULT_ALPHA]));
        assert_eq!(store.warnings(), [Warning::MissingAlpha { layer: 0 }]);
    }

    #[test]
    fn finalize_without_layers_fails() {
        let store = LayerStore::with_canvas(10, 10);
        assert!(matches!(store.finalize(), Err(Error::EmptyInput)));
        assert!(matches!(LayerStore::new(None).finalize(), Err(Error::EmptyInput)));
    }

    #[test]
    fn gray_then_white_scenario() {
        let mut store = LayerStore::new(None);
        store.add_layer(RgbaImage::from_pixel(10, 10, Rgba([128, 128, 128, 255])), (0, 0));
        store.add_layer(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])), (2, 2));

        assert_eq!(store.canvas(), Some(Canvas::new(10, 10)));
        assert_eq!(store.warnings(), [Warning::MissingAlpha { layer: 1 }]);

        let finalized = store.finalize().unwrap();
        let composite = &finalized.composite;
        assert_eq!(composite.dimensions(), (10, 10));
        assert_eq!(composite.get_pixel(1, 1).0, [128, 128, 128, 255]);
        assert_eq!(composite.get_pixel(2, 2).0, [192, 192, 192, 255]);
        assert_eq!(composite.get_pixel(9, 9).0, [192, 192, 192, 255]);

        let white = &finalized.layers[1];
        assert_eq!(white.name, "layer_1");
        assert_eq!((white.rect.top, white.rect.left), (2, 2));
        assert_eq!((white.rect.bottom, white.rect.right), (12, 12));
    }

    proptest! {
        #[test]
        fn names_are_positional(channels in prop::collection::vec(prop::bool::ANY, 1..12)) {
            let mut store = LayerStore::with_canvas(2, 2);
            for (i, rgb) in channels.iter().enumerate() {
                // Every other layer mismatches the canvas as well.
                let size = 2 + (i % 2) as u32;
                if *rgb {
                    store.add_layer(RgbImage::new(size, size), (0, 0));
                } else {
                    store.add_layer(RgbaImage::new(size, size), (0, 0));
                }
            }

            let finalized = store.finalize().unwrap();
            prop_assert_eq!(finalized.layers.len(), channels.len());
            for (i, layer) in finalized.layers.iter().enumerate() {
                prop_assert_eq!(&layer.name, &format!("layer_{i}"));
            }
        }
    }
}
