//! Frame annotation: entity outlines in identity colors and center markers.

use image::{Rgb, RgbImage};
use redlight_vision::FrameReport;
use redlight_vision::core_modules::geometry::{BoundingBox, Point};

const OUTLINE_THICKNESS: u32 = 2;
const MARKER_RADIUS: i64 = 5;

pub fn annotate(frame: &RgbImage, report: &FrameReport) -> RgbImage {
    let mut canvas = frame.clone();
    for (bounds, color) in &report.entities {
        draw_outline(&mut canvas, *bounds, *color);
    }
    for marker in &report.markers {
        draw_disc(&mut canvas, marker.center, marker.color);
    }
    canvas
}

fn draw_outline(canvas: &mut RgbImage, bounds: BoundingBox, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    let clipped = bounds.clip_to(width, height);
    if clipped.area() == 0 {
        return;
    }
    let thickness = OUTLINE_THICKNESS.min(clipped.width).min(clipped.height);
    for y in clipped.y..clipped.bottom() {
        for x in clipped.x..clipped.right() {
            let on_edge = x < clipped.x + thickness
                || x >= clipped.right() - thickness
                || y < clipped.y + thickness
                || y >= clipped.bottom() - thickness;
            if on_edge {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

fn draw_disc(canvas: &mut RgbImage, center: Point, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
    for dy in -MARKER_RADIUS..=MARKER_RADIUS {
        for dx in -MARKER_RADIUS..=MARKER_RADIUS {
            if dx * dx + dy * dy > MARKER_RADIUS * MARKER_RADIUS {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < width as i64 && y < height as i64 {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redlight_vision::Marker;

    fn report(entities: Vec<(BoundingBox, Rgb<u8>)>, markers: Vec<Marker>) -> FrameReport {
        FrameReport {
            frame_index: 0,
            entities,
            markers,
            violations: Vec::new(),
            debug: None,
        }
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let frame = RgbImage::new(20, 20);
        let blue = Rgb([0, 0, 255]);
        let out = annotate(&frame, &report(vec![(BoundingBox::new(2, 2, 10, 10), blue)], vec![]));
        assert_eq!(out.get_pixel(2, 2), &blue);
        assert_eq!(out.get_pixel(11, 6), &blue);
        assert_eq!(out.get_pixel(6, 6), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(13, 13), &Rgb([0, 0, 0]));
    }

    #[test]
    fn markers_near_the_edge_are_clipped() {
        let frame = RgbImage::new(8, 8);
        let red = Rgb([255, 0, 0]);
        let marker = Marker {
            identity_id: 0,
            center: Point::new(0.0, 0.0),
            moving: true,
            color: red,
        };
        let out = annotate(&frame, &report(vec![(BoundingBox::new(50, 50, 5, 5), red)], vec![marker]));
        assert_eq!(out.get_pixel(0, 0), &red);
        assert_eq!(out.get_pixel(7, 7), &Rgb([0, 0, 0]));
    }
}
