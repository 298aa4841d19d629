// THEORY:
// The `imaging` module is the toolbox of low-level raster primitives that every
// other layer is built from: intensity conversion, Gaussian smoothing, blending,
// differencing, thresholding, morphology and histograms. Each function is a pure
// transformation of `image` buffers; none of them keep state between frames.
//
// Key principles:
// 1.  **Single-channel core**: all motion analysis happens on `GrayImage`. Color is
//     only consulted when building appearance histograms.
// 2.  **Fail fast on shape**: any operation combining two buffers validates that
//     they share dimensions and returns `VisionError::DimensionMismatch` otherwise.
// 3.  **Delegated heavy lifting**: smoothing and morphology come from `imageproc`;
//     this module only fixes the kernel shapes and iteration semantics the rest of
//     the engine relies on.

use crate::core_modules::geometry::BoundingBox;
use crate::error::{VisionError, VisionResult};
use image::{GrayImage, Luma, RgbImage, imageops};
use imageproc::distance_transform::Norm;
use imageproc::{filter, morphology};
use serde::{Deserialize, Serialize};

/// Width and height of a Gaussian kernel, in pixels. Both must be odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSize {
    pub width: u32,
    pub height: u32,
}

impl KernelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width % 2 == 1 && self.height % 2 == 1
    }
}

/// Converts a color frame to single-channel intensity using Rec. 601 weights.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in frame.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let luminance = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        dst.0 = [luminance.round().clamp(0.0, 255.0) as u8];
    }
    gray
}

/// Standard deviation implied by a kernel dimension.
fn sigma_for(size: u32) -> f64 {
    0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_weights(size: u32) -> Vec<f32> {
    let sigma = sigma_for(size);
    let center = (size as f64 - 1.0) / 2.0;
    let raw: Vec<f64> = (0..size)
        .map(|i| (-(i as f64 - center).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / total) as f32).collect()
}

/// Separable Gaussian blur with an anisotropic kernel. Borders replicate the edge
/// pixel.
pub fn gaussian_blur(image: &GrayImage, kernel: KernelSize) -> VisionResult<GrayImage> {
    if !kernel.is_valid() {
        return Err(VisionError::config(format!(
            "gaussian kernel must be odd, got {}x{}",
            kernel.width, kernel.height
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Ok(image.clone());
    }
    let kx = gaussian_weights(kernel.width);
    let ky = gaussian_weights(kernel.height);
    Ok(filter::separable_filter(image, &kx, &ky))
}

/// Saturating `a * alpha + b * beta + gamma`, rounded per pixel.
pub fn add_weighted(
    a: &GrayImage,
    alpha: f64,
    b: &GrayImage,
    beta: f64,
    gamma: f64,
) -> VisionResult<GrayImage> {
    VisionError::check_dimensions("add_weighted", a.dimensions(), b.dimensions())?;
    let (width, height) = a.dimensions();
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let value = a.get_pixel(x, y).0[0] as f64 * alpha + b.get_pixel(x, y).0[0] as f64 * beta + gamma;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Per-pixel absolute difference.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> VisionResult<GrayImage> {
    VisionError::check_dimensions("abs_diff", a.dimensions(), b.dimensions())?;
    let (width, height) = a.dimensions();
    Ok(GrayImage::from_fn(width, height, |x, y| {
        Luma([a.get_pixel(x, y).0[0].abs_diff(b.get_pixel(x, y).0[0])])
    }))
}

/// Pixels strictly above `threshold` become 255, everything else 0.
pub fn threshold_binary(image: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if image.get_pixel(x, y).0[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Largest radius a single morphology call accepts.
const MAX_MORPH_RADIUS: u32 = u8::MAX as u32;

/// Runs a square-element binary morphology operator as `iterations` passes of a
/// 3x3 element. Nonzero pixels are foreground; out-of-frame pixels do not count.
fn morph_square(
    image: &GrayImage,
    iterations: u32,
    op: fn(&GrayImage, Norm, u8) -> GrayImage,
) -> GrayImage {
    let mut current = image.clone();
    if image.width() == 0 || image.height() == 0 {
        return current;
    }
    let mut remaining = iterations;
    while remaining > 0 {
        let radius = remaining.min(MAX_MORPH_RADIUS);
        current = op(&current, Norm::LInf, radius as u8);
        remaining -= radius;
    }
    current
}

/// Binary dilation with a 3x3 rectangle, repeated `iterations` times.
pub fn dilate(image: &GrayImage, iterations: u32) -> GrayImage {
    morph_square(image, iterations, morphology::dilate)
}

/// Binary erosion with a 3x3 rectangle, repeated `iterations` times.
pub fn erode(image: &GrayImage, iterations: u32) -> GrayImage {
    morph_square(image, iterations, morphology::erode)
}

/// Binary mask of pixels whose every channel lies within `[lower, upper]`.
pub fn in_range(frame: &RgbImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    let (width, height) = frame.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let px = frame.get_pixel(x, y).0;
        let inside = (0..3).all(|c| px[c] >= lower[c] && px[c] <= upper[c]);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// Copies the part of `frame` covered by `bounds`, clipped to the frame.
pub fn crop(frame: &RgbImage, bounds: &BoundingBox) -> RgbImage {
    let (width, height) = frame.dimensions();
    let clipped = bounds.clip_to(width, height);
    imageops::crop_imm(frame, clipped.x, clipped.y, clipped.width, clipped.height).to_image()
}

/// 256-bin histogram over every channel value of the image.
pub fn histogram256(image: &RgbImage) -> Vec<f64> {
    let mut bins = [0u64; 256];
    for &value in image.as_raw() {
        bins[value as usize] += 1;
    }
    bins.iter().map(|&count| count as f64).collect()
}
