// THEORY:
// The `motion_mask` module is the temporal front end of the engine. It answers a
// single question per frame: "which pixels differ from the scene we expected?"
//
// The expected scene is a slowly adapting background: a weighted blend that leans
// heavily on the baseline frame captured when the session started and only lightly
// on the previous frame. Comparing the current frame against that blend, after a
// heavy blur to drown out sensor noise, yields a difference image that is then
// binarized and dilated so nearby fragments of one body fuse into one blob.

use crate::core_modules::imaging::{self, KernelSize};
use crate::error::{VisionError, VisionResult};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Tunable constants for background differencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub blur_kernel: KernelSize,
    /// Weight of the session baseline in the background estimate.
    pub baseline_weight: f64,
    /// Weight of the previous frame in the background estimate.
    pub previous_weight: f64,
    /// Constant added to the background estimate.
    pub bias: f64,
    /// Differences strictly above this value count as motion.
    pub threshold: u8,
    pub dilate_iterations: u32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            blur_kernel: KernelSize::new(11, 51),
            baseline_weight: 0.8,
            previous_weight: 0.2,
            bias: 5.0,
            threshold: 25,
            dilate_iterations: 2,
        }
    }
}

impl MaskConfig {
    /// Coarse arena preset: compares against the baseline alone with a much wider
    /// blur and a higher threshold. Pair it with a minimum region area.
    pub fn baseline_only() -> Self {
        Self {
            blur_kernel: KernelSize::new(51, 151),
            baseline_weight: 1.0,
            previous_weight: 0.0,
            bias: 0.0,
            threshold: 50,
            dilate_iterations: 5,
        }
    }
}

/// The intermediate images of one mask computation.
#[derive(Debug, Clone)]
pub struct MaskOutput {
    /// Blurred background estimate. Color keying reports the frame's intensity.
    pub blend: GrayImage,
    /// Absolute difference between the background and the current frame. Color
    /// keying reports the raw in-range mask.
    pub diff: GrayImage,
    /// Final binary mask handed to region extraction.
    pub mask: GrayImage,
}

/// Produces binary motion masks from three blurred intensity frames.
#[derive(Debug, Clone, Default)]
pub struct MotionMask {
    config: MaskConfig,
}

impl MotionMask {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    /// Grayscale plus blur, the preprocessing applied to every input frame.
    pub fn prepare(&self, frame: &RgbImage) -> VisionResult<GrayImage> {
        imaging::gaussian_blur(&imaging::to_gray(frame), self.config.blur_kernel)
    }

    /// Computes the mask from raw color frames.
    pub fn compute(
        &self,
        baseline: &RgbImage,
        previous: &RgbImage,
        current: &RgbImage,
    ) -> VisionResult<MaskOutput> {
        VisionError::check_dimensions("motion mask", baseline.dimensions(), previous.dimensions())?;
        VisionError::check_dimensions("motion mask", baseline.dimensions(), current.dimensions())?;
        self.compute_prepared(
            &self.prepare(baseline)?,
            &self.prepare(previous)?,
            &self.prepare(current)?,
        )
    }

    /// Computes the mask from frames that already went through [`MotionMask::prepare`].
    /// The pipeline uses this to avoid re-blurring the baseline every frame.
    pub fn compute_prepared(
        &self,
        baseline: &GrayImage,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> VisionResult<MaskOutput> {
        let blend = imaging::add_weighted(
            baseline,
            self.config.baseline_weight,
            previous,
            self.config.previous_weight,
            self.config.bias,
        )?;
        let diff = imaging::abs_diff(current, &blend)?;
        let binary = imaging::threshold_binary(&diff, self.config.threshold);
        let mask = imaging::dilate(&binary, self.config.dilate_iterations);
        Ok(MaskOutput { blend, diff, mask })
    }
}

/// Color-keyed object mask: pixels inside an RGB range, opened by an erosion and
/// dilation pass to remove speckle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRangeMask {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
    pub iterations: u32,
}

impl ColorRangeMask {
    pub fn compute(&self, frame: &RgbImage) -> GrayImage {
        self.compute_output(frame).mask
    }

    pub fn compute_output(&self, frame: &RgbImage) -> MaskOutput {
        let keyed = imaging::in_range(frame, self.lower, self.upper);
        let opened = imaging::erode(&keyed, self.iterations);
        MaskOutput {
            blend: imaging::to_gray(frame),
            mask: imaging::dilate(&opened, self.iterations),
            diff: keyed,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lower.iter().zip(&self.upper).all(|(low, high)| low <= high)
    }
}

/// Where the per-frame foreground mask comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskSource {
    /// Background differencing driven by `MaskConfig`.
    #[default]
    Motion,
    /// Color keying. Ignores the baseline and the previous frame.
    ColorRange(ColorRangeMask),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gray_frame(width: u32, height: u32, level: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([level, level, level]))
    }

    #[test]
    fn static_scene_produces_empty_mask() -> VisionResult<()> {
        let frame = gray_frame(64, 64, 128);
        let out = MotionMask::default().compute(&frame, &frame, &frame)?;
        // The +5 bias alone stays under the threshold.
        assert!(out.diff.pixels().all(|p| p.0[0] == 5));
        assert!(out.mask.pixels().all(|p| p.0[0] == 0));
        Ok(())
    }

    #[test]
    fn mismatched_frames_fail_fast() {
        let a = gray_frame(64, 64, 128);
        let b = gray_frame(64, 32, 128);
        let result = MotionMask::default().compute(&a, &a, &b);
        assert!(matches!(result, Err(VisionError::DimensionMismatch { .. })));
    }

    #[test]
    fn bright_patch_is_masked() -> VisionResult<()> {
        let baseline = gray_frame(120, 160, 100);
        let mut current = baseline.clone();
        for y in 60..100 {
            for x in 40..80 {
                current.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        let out = MotionMask::default().compute(&baseline, &baseline, &current)?;
        assert_eq!(out.mask.get_pixel(60, 80).0[0], 255);
        assert_eq!(out.mask.get_pixel(5, 5).0[0], 0);
        Ok(())
    }

    #[test]
    fn color_range_mask_removes_speckle() {
        let mut frame = gray_frame(30, 30, 0);
        for y in 10..20 {
            for x in 10..20 {
                frame.put_pixel(x, y, Rgb([120, 0, 0]));
            }
        }
        frame.put_pixel(2, 2, Rgb([120, 0, 0]));
        let mask = ColorRangeMask {
            lower: [81, 0, 0],
            upper: [179, 0, 0],
            iterations: 3,
        }
        .compute(&frame);
        assert_eq!(mask.get_pixel(2, 2).0[0], 0);
        assert_eq!(mask.get_pixel(15, 15).0[0], 255);
    }
}
