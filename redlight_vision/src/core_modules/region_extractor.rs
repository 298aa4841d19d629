// THEORY:
// The `region_extractor` turns the binary motion mask into a list of rectangles,
// one per connected foreground blob. It is the bridge between pixel space and the
// object-level layers above it.
//
// Algorithm:
// 1.  **Border following**: `imageproc` traces every border of the mask with
//     8-connected foreground, recording for each border whether it is an outer
//     border or a hole border and which border encloses it.
// 2.  **Outer-only**: only outer borders without a parent are kept. A blob floating
//     inside another blob's hole is nested, and only the outermost outline of a
//     shape is reported.
// 3.  **Aggregation**: the bounding box of each kept outline is computed, and
//     outlines whose enclosed polygon area does not exceed the optional minimum are
//     dropped.

use crate::core_modules::geometry::BoundingBox;
use image::GrayImage;
use imageproc::contours::{self, BorderType, Contour};
use serde::{Deserialize, Serialize};

/// Region filtering policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Outlines enclosing a polygon area not strictly above this value are
    /// discarded. `None` keeps every blob, including single-pixel noise.
    pub min_area: Option<u64>,
}

/// Extracts outer contour bounding boxes from binary masks.
#[derive(Debug, Clone, Default)]
pub struct RegionExtractor {
    config: RegionConfig,
}

impl RegionExtractor {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    /// Returns one bounding box per outer blob, ordered by the raster position of
    /// each blob's first border pixel.
    pub fn extract(&self, mask: &GrayImage) -> Vec<BoundingBox> {
        if mask.width() == 0 || mask.height() == 0 {
            return Vec::new();
        }
        contours::find_contours::<u32>(mask)
            .iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .filter(|contour| {
                self.config
                    .min_area
                    .is_none_or(|min| polygon_area(contour) > min as f64)
            })
            .filter_map(bounding_box)
            .collect()
    }
}

fn bounding_box(contour: &Contour<u32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Shoelace area of the polygon through the outline's pixel centers.
fn polygon_area(contour: &Contour<u32>) -> f64 {
    let points = &contour.points;
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn separate_blobs_get_separate_boxes() {
        let mut mask = GrayImage::new(100, 100);
        fill(&mut mask, 10, 10, 20, 30);
        fill(&mut mask, 60, 50, 90, 55);
        let boxes = RegionExtractor::default().extract(&mask);
        assert_eq!(
            boxes,
            vec![BoundingBox::new(10, 10, 10, 20), BoundingBox::new(60, 50, 30, 5)]
        );
    }

    #[test]
    fn diagonal_pixels_join_one_blob() {
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(2, 2, Luma([255]));
        mask.put_pixel(3, 3, Luma([255]));
        let boxes = RegionExtractor::default().extract(&mask);
        assert_eq!(boxes, vec![BoundingBox::new(2, 2, 2, 2)]);
    }

    #[test]
    fn blob_inside_a_hole_is_not_reported() {
        let mut mask = GrayImage::new(50, 50);
        fill(&mut mask, 5, 5, 45, 45);
        // Carve a hole and drop an island in it.
        for y in 10..40 {
            for x in 10..40 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        fill(&mut mask, 20, 20, 25, 25);
        let boxes = RegionExtractor::default().extract(&mask);
        assert_eq!(boxes, vec![BoundingBox::new(5, 5, 40, 40)]);
    }

    #[test]
    fn shape_touching_frame_edge_is_kept() {
        let mut mask = GrayImage::new(20, 20);
        fill(&mut mask, 0, 0, 20, 20);
        let boxes = RegionExtractor::default().extract(&mask);
        assert_eq!(boxes, vec![BoundingBox::new(0, 0, 20, 20)]);
    }

    #[test]
    fn min_area_filters_small_blobs() {
        let mut mask = GrayImage::new(200, 200);
        fill(&mut mask, 0, 0, 3, 3);
        fill(&mut mask, 100, 100, 160, 160);
        let extractor = RegionExtractor::new(RegionConfig {
            min_area: Some(3000),
        });
        assert_eq!(
            extractor.extract(&mask),
            vec![BoundingBox::new(100, 100, 60, 60)]
        );
        assert_eq!(RegionExtractor::default().extract(&mask).len(), 2);
    }

    #[test]
    fn outline_area_spans_pixel_centers() {
        let mut mask = GrayImage::new(80, 80);
        fill(&mut mask, 10, 10, 70, 70);
        let outline = contours::find_contours::<u32>(&mask);
        assert_eq!(outline.len(), 1);
        assert_eq!(polygon_area(&outline[0]), 59.0 * 59.0);
    }
}
