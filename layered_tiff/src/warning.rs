//! Non-fatal notices raised while layers are collected. They never stop a
//! write; the affected layer is stored anyway and the notice is handed back
//! to the caller with the result.

use std::fmt::{self, Display};

use crate::Canvas;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The layer had three channels. A constant alpha plane was added.
    MissingAlpha { layer: usize },
    /// The layer's size differs from the canvas. It is stored unchanged and
    /// only the overlapping part shows up in the composite.
    ShapeMismatch {
        layer: usize,
        layer_shape: Canvas,
        canvas: Canvas,
    },
}

impl Warning {
    /// Index of the layer the notice is about.
    pub fn layer(&self) -> usize {
        match self {
            Warning::MissingAlpha { layer } | Warning::ShapeMismatch { layer, .. } => *layer,
        }
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingAlpha { layer } => {
                write!(f, "layer {layer} has only 3 channels (should be RGBA)")
            }
            Warning::ShapeMismatch {
                layer,
                layer_shape,
                canvas,
            } => write!(
                f,
                "layer {layer} shape is {layer_shape}, existing canvas shape is {canvas}"
            ),
        }
    }
}
