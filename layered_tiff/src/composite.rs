//! Flattens the layer stack into the single image generic viewers show.

use image::RgbaImage;

use crate::{Canvas, Layer};

/// Alpha-composites `layers` in order onto a transparent canvas. Later layers
/// are drawn on top; parts of a layer outside the canvas are dropped.
///
/// Blending is done on normalized floats and rounded once at the end, so
/// stacking many layers does not accumulate rounding error.
pub fn overlay<'a>(canvas: Canvas, layers: impl IntoIterator<Item = &'a Layer>) -> RgbaImage {
    let (width, height) = (canvas.width as usize, canvas.height as usize);
    let mut acc = vec![[0f32; 4]; width * height];

    for layer in layers {
        let (layer_width, layer_height) = layer.pixels.dimensions();
        let (row, col) = (layer.offset.row as i64, layer.offset.col as i64);

        // Visible window in canvas coordinates, [start, end).
        let y0 = row.clamp(0, height as i64);
        let y1 = (row + layer_height as i64).clamp(0, height as i64);
        let x0 = col.clamp(0, width as i64);
        let x1 = (col + layer_width as i64).clamp(0, width as i64);

        for y in y0..y1 {
            for x in x0..x1 {
                let src = layer.pixels.get_pixel((x - col) as u32, (y - row) as u32).0;
                let dst = &mut acc[y as usize * width + x as usize];
                blend(dst, src);
            }
        }
    }

    let data = acc
        .iter()
        .flat_map(|pixel| pixel.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8))
        .collect();
    RgbaImage::from_raw(canvas.width, canvas.height, data).unwrap_or_default()
}

/// `out = src * a + dst * (1 - a)` for color, and the same for alpha.
fn blend(dst: &mut [f32; 4], src: [u8; 4]) {
    let alpha = src[3] as f32 / 255.0;
    let inv = 1.0 - alpha;

    for c in 0..3 {
        dst[c] = src[c] as f32 / 255.0 * alpha + dst[c] * inv;
    }
    dst[3] = alpha + dst[3] * inv;
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;

    use super::overlay;
    use crate::{Canvas, Layer, Offset};

    fn solid(width: u32, height: u32, color: [u8; 4], offset: (i32, i32)) -> Layer {
        Layer {
            pixels: RgbaImage::from_pixel(width, height, Rgba(color)),
            offset: offset.into(),
        }
    }

    #[test]
    fn opaque_layer_replaces() {
        let layers = [
            solid(4, 4, [10, 20, 30, 255], (0, 0)),
            solid(2, 2, [200, 100, 50, 255], (1, 1)),
        ];
        let out = overlay(Canvas::new(4, 4), &layers);

        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30, 255]);
        assert_eq!(out.get_pixel(1, 1).0, [200, 100, 50, 255]);
        assert_eq!(out.get_pixel(2, 2).0, [200, 100, 50, 255]);
        assert_eq!(out.get_pixel(3, 3).0, [10, 20, 30, 255]);
    }

    #[test]
    fn empty_canvas_is_transparent_black() {
        let out = overlay(Canvas::new(2, 3), &Vec::<Layer>::new());
        assert_eq!(out.dimensions(), (3, 2));
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn half_alpha_over_gray() {
        let layers = [
            solid(10, 10, [128, 128, 128, 255], (0, 0)),
            solid(10, 10, [255, 255, 255, 128], (2, 2)),
        ];
        let out = overlay(Canvas::new(10, 10), &layers);

        // 255 * 128/255 + 128 * 127/255 = 191.75
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128, 255]);
        assert_eq!(out.get_pixel(1, 5).0, [128, 128, 128, 255]);
        assert_eq!(out.get_pixel(2, 2).0, [192, 192, 192, 255]);
        assert_eq!(out.get_pixel(9, 9).0, [192, 192, 192, 255]);
    }

    #[test]
    fn alpha_accumulates() {
        let layers = [
            solid(1, 1, [0, 0, 0, 128], (0, 0)),
            solid(1, 1, [0, 0, 0, 128], (0, 0)),
        ];
        let out = overlay(Canvas::new(1, 1), &layers);

        // a = 0.502 + 0.502 * 0.498
        assert_eq!(out.get_pixel(0, 0).0[3], 192);
    }

    #[test]
    fn negative_offset_is_clipped() {
        let layers = [solid(3, 3, [255, 0, 0, 255], (-2, -1))];
        let out = overlay(Canvas::new(3, 3), &layers);

        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(2, 0).0, [0, 0, 0, 0]);
        assert_eq!(out.get_pixel(0, 1).0, [0, 0, 0, 0]);
    }

    proptest! {
        #[test]
        fn only_covered_pixels_change(
            (w, h) in (1u32..8, 1u32..8),
            (row, col) in (-10i32..10, -10i32..10),
            (lw, lh) in (0u32..8, 0u32..8),
        ) {
            let layer = solid(lw, lh, [255, 255, 255, 255], (row, col));
            let out = overlay(Canvas::new(h, w), [&layer]);
            prop_assert_eq!(out.dimensions(), (w, h));

            for (x, y, pixel) in out.enumerate_pixels() {
                let (x, y) = (x as i32, y as i32);
                let inside = y >= row && y < row + lh as i32 && x >= col && x < col + lw as i32;
                let expected = if inside { [255; 4] } else { [0; 4] };
                prop_assert_eq!(pixel.0, expected);
            }
        }
    }

    #[test]
    fn offset_default_is_origin() {
        assert_eq!(Offset::default(), Offset::new(0, 0));
    }
}
