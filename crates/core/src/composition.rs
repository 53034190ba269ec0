//! Composition engine: merges N images onto one fixed-size canvas.
//!
//! The canvas is split into `n` equal vertical slices (`floor(width / n)`
//! pixels each, full height). Each input is scaled to fit its slice with the
//! aspect ratio preserved, centered, and drawn over a uniform background.
//! Slices are laid out left-to-right in input order. Any input that cannot be
//! read or decoded aborts the whole composition.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A4 landscape at 300 DPI.
pub const CANVAS_WIDTH: u32 = 3508;
pub const CANVAS_HEIGHT: u32 = 2480;

/// Largest number of inputs any route may compose.
pub const MAX_COMPOSITION_INPUTS: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub background: Rgba<u8>,
    pub max_inputs: usize,
    pub filter: FilterType,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            background: Rgba([255, 255, 255, 255]),
            max_inputs: MAX_COMPOSITION_INPUTS,
            filter: FilterType::Lanczos3,
        }
    }
}

/// Horizontal extent of one input's section of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub x: u32,
    pub width: u32,
}

/// An encoded canvas plus the layout used to build it.
#[derive(Debug, Clone)]
pub struct Composition {
    /// PNG-encoded canvas.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub slices: Vec<Slice>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("No images to compose")]
    Empty,

    #[error("Too many images to compose: {count} (max {max})")]
    TooMany { count: usize, max: usize },

    #[error("Image {index} could not be read: {reason}")]
    Unreadable { index: usize, reason: String },

    #[error("Image {index} could not be decoded: {reason}")]
    Undecodable { index: usize, reason: String },

    #[error("Failed to encode composition: {0}")]
    Encode(String),
}

impl CompositionError {
    /// Zero-based position of the offending input, when one is to blame.
    pub fn input_index(&self) -> Option<usize> {
        match self {
            Self::Unreadable { index, .. } | Self::Undecodable { index, .. } => Some(*index),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Equal-width slices for `count` inputs across a canvas `width` pixels wide.
pub fn slice_layout(width: u32, count: usize) -> Vec<Slice> {
    if count == 0 {
        return Vec::new();
    }
    let slice_width = width / count as u32;
    (0..count)
        .map(|index| Slice {
            index,
            x: index as u32 * slice_width,
            width: slice_width,
        })
        .collect()
}

/// Largest size with the same aspect ratio as `(w, h)` that fits inside
/// `(max_w, max_h)`. Never returns a zero dimension.
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    let fit_w = ((w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let fit_h = ((h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (fit_w, fit_h)
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

/// Compose encoded images, in order, onto the canvas described by `spec`.
pub fn compose_with<B: AsRef<[u8]>>(
    spec: &CanvasSpec,
    inputs: &[B],
) -> Result<Composition, CompositionError> {
    if inputs.is_empty() {
        return Err(CompositionError::Empty);
    }
    if inputs.len() > spec.max_inputs {
        return Err(CompositionError::TooMany {
            count: inputs.len(),
            max: spec.max_inputs,
        });
    }

    // Decode everything up front so a bad input never yields a partial canvas.
    let decoded = inputs
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            image::load_from_memory(bytes.as_ref()).map_err(|e| CompositionError::Undecodable {
                index,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<DynamicImage>, _>>()?;

    let slices = slice_layout(spec.width, decoded.len());
    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, spec.background);

    for (img, slice) in decoded.iter().zip(&slices) {
        let (fit_w, fit_h) = fit_within(img.width(), img.height(), slice.width, spec.height);
        let resized = imageops::resize(&img.to_rgba8(), fit_w, fit_h, spec.filter);
        let x = slice.x + (slice.width - fit_w) / 2;
        let y = (spec.height - fit_h) / 2;
        imageops::overlay(&mut canvas, &resized, i64::from(x), i64::from(y));
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| CompositionError::Encode(e.to_string()))?;

    Ok(Composition {
        bytes,
        width: spec.width,
        height: spec.height,
        slices,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::{GenericImageView, Rgb, RgbImage};

    use super::*;

    fn small_spec() -> CanvasSpec {
        CanvasSpec {
            width: 300,
            height: 200,
            filter: FilterType::Nearest,
            ..CanvasSpec::default()
        }
    }

    fn png(w: u32, h: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb(color));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([10, 200, 10]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    #[test]
    fn slice_widths_cover_canvas_within_rounding() {
        for n in 1..=5usize {
            let slices = slice_layout(CANVAS_WIDTH, n);
            assert_eq!(slices.len(), n);
            let total: u32 = slices.iter().map(|s| s.width).sum();
            assert!(CANVAS_WIDTH - total <= (n as u32 - 1), "n={n} total={total}");
            for pair in slices.windows(2) {
                assert_eq!(pair[0].x + pair[0].width, pair[1].x);
            }
        }
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        assert_eq!(fit_within(100, 200, 150, 200), (100, 200));
        assert_eq!(fit_within(400, 100, 150, 200), (150, 38));
        assert_eq!(fit_within(10, 10, 150, 200), (150, 150));
    }

    #[test]
    fn canvas_size_is_constant_regardless_of_inputs() {
        let inputs = vec![png(40, 90, [255, 0, 0]), jpeg(300, 120), png(7, 7, [0, 0, 255])];
        for n in 1..=3 {
            let composition = compose_with(&small_spec(), &inputs[..n]).unwrap();
            let decoded = image::load_from_memory(&composition.bytes).unwrap();
            assert_eq!(decoded.dimensions(), (300, 200));
            assert_eq!(composition.slices.len(), n);
        }
    }

    #[test]
    fn default_canvas_is_a4_at_300_dpi() {
        let spec = CanvasSpec {
            filter: FilterType::Nearest,
            ..CanvasSpec::default()
        };
        let composition = compose_with(&spec, &[png(20, 30, [0, 0, 0]), png(30, 20, [0, 0, 0])])
            .unwrap();
        assert_eq!((composition.width, composition.height), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert_eq!(composition.slices.len(), 2);
    }

    #[test]
    fn slices_follow_input_order_with_background_fill() {
        let red = png(10, 10, [255, 0, 0]);
        let blue = png(10, 10, [0, 0, 255]);
        let composition = compose_with(&small_spec(), &[red, blue]).unwrap();
        let canvas = image::load_from_memory(&composition.bytes).unwrap().to_rgb8();

        // Square inputs in 150x200 slices are 150x150, centered vertically.
        assert_eq!(canvas.get_pixel(75, 100), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(225, 100), &Rgb([0, 0, 255]));
        assert_eq!(canvas.get_pixel(75, 5), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(225, 195), &Rgb([255, 255, 255]));
    }

    #[test]
    fn undecodable_input_names_its_index() {
        let err = compose_with(&small_spec(), &[png(5, 5, [1, 2, 3]), b"not an image".to_vec()])
            .unwrap_err();
        assert_matches!(err, CompositionError::Undecodable { index: 1, .. });
        assert_eq!(err.input_index(), Some(1));
    }

    #[test]
    fn empty_and_oversized_input_sets_are_rejected() {
        let none: [Vec<u8>; 0] = [];
        assert_matches!(compose_with(&small_spec(), &none), Err(CompositionError::Empty));

        let six: Vec<_> = (0..6).map(|_| png(2, 2, [0, 0, 0])).collect();
        assert_matches!(
            compose_with(&small_spec(), &six),
            Err(CompositionError::TooMany { count: 6, max: 5 })
        );
    }
}
