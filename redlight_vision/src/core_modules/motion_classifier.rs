// THEORY:
// The `MotionClassifier` makes the call the game is built around: is this player
// moving right now? Two independent signals are OR-ed together.
//
// 1.  **Center-of-mass displacement**: the identity's center is recomputed as the
//     mean center of the rectangles attributed to it this frame. A jump of more
//     than a fixed distance since the last frame counts as motion.
// 2.  **Localized frame subtraction**: a vertical band of the frame around the
//     player's center is differenced against the previous frame. The summed
//     difference, normalized by full-scale intensity and by the band height, must
//     reach a ratio of 1.0. In other words each row of the band has to carry at
//     least one full-scale pixel's worth of change on average, which makes this a
//     deliberately coarse, strict second opinion.
//
// The subtraction signal uses its own blur and does not share any state with the
// motion mask.

use crate::core_modules::geometry::{BoundingBox, Point};
use crate::core_modules::identity::TrackedIdentity;
use crate::core_modules::imaging::{self, KernelSize};
use crate::error::VisionResult;
use image::{GrayImage, RgbImage, imageops};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Center displacement strictly above this many pixels is motion.
    pub displacement_threshold: f64,
    /// Half width of the subtraction band, in pixels.
    pub band_half_width: u32,
    /// Normalized band difference at or above this ratio is motion.
    pub subtraction_ratio: f64,
    pub blur_kernel: KernelSize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            displacement_threshold: 20.0,
            band_half_width: 100,
            subtraction_ratio: 1.0,
            blur_kernel: KernelSize::new(11, 51),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MotionClassifier {
    config: MotionConfig,
}

impl MotionClassifier {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    /// Grayscale plus this classifier's blur.
    pub fn prepare(&self, frame: &RgbImage) -> VisionResult<GrayImage> {
        imaging::gaussian_blur(&imaging::to_gray(frame), self.config.blur_kernel)
    }

    /// Moves the identity's center to the mean center of `rectangles` and reports
    /// whether it travelled further than the displacement threshold.
    ///
    /// With no rectangles the center stays where it was and no motion is reported.
    pub fn update_center(&self, identity: &mut TrackedIdentity, rectangles: &[BoundingBox]) -> bool {
        identity.previous_center_of_mass = identity.center_of_mass;
        if rectangles.is_empty() {
            return false;
        }
        let count = rectangles.len() as f64;
        let (sum_x, sum_y) = rectangles.iter().fold((0.0, 0.0), |(sx, sy), rect| {
            let center = rect.center();
            (sx + center.x, sy + center.y)
        });
        identity.center_of_mass = Point::new(sum_x / count, sum_y / count);
        identity.center_of_mass.distance(&identity.previous_center_of_mass)
            > self.config.displacement_threshold
    }

    /// Normalized difference inside the vertical band around `center`.
    pub fn band_score(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        center: Point,
    ) -> VisionResult<f64> {
        let diff = imaging::abs_diff(current, previous)?;
        let (width, height) = diff.dimensions();
        if height == 0 {
            return Ok(0.0);
        }
        let cx = center.x.floor() as i64;
        let half = self.config.band_half_width as i64;
        let left = (cx - half).clamp(0, width as i64) as u32;
        let right = (cx + half).clamp(0, width as i64) as u32;
        if right <= left {
            return Ok(0.0);
        }
        let band = imageops::crop_imm(&diff, left, 0, right - left, height).to_image();
        let total: u64 = band.pixels().map(|p| p.0[0] as u64).sum();
        Ok(total as f64 / (255.0 * height as f64))
    }

    /// Localized frame-subtraction signal over prepared (gray, blurred) frames.
    pub fn band_motion(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        center: Point,
    ) -> VisionResult<bool> {
        Ok(self.band_score(previous, current, center)? >= self.config.subtraction_ratio)
    }

    /// Both signals for one relevant identity. The center is updated first and the
    /// band is taken around the updated center.
    pub fn is_moving(
        &self,
        identity: &mut TrackedIdentity,
        rectangles: &[BoundingBox],
        previous: &GrayImage,
        current: &GrayImage,
    ) -> VisionResult<bool> {
        if self.update_center(identity, rectangles) {
            return Ok(true);
        }
        self.band_motion(previous, current, identity.center_of_mass)
    }
}
