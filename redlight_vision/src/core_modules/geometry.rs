// THEORY:
// The `geometry` module holds the "dumb" spatial data containers shared by every
// layer of the pipeline. A `BoundingBox` is what the region extractor produces and
// what the entity clusterer merges; a `Point` is what the motion classifier tracks
// from frame to frame. Neither type knows anything about pixels.

use serde::{Deserialize, Serialize};

/// A simple struct to represent a 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned rectangle `(x, y, width, height)` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Center as `(x + width / 2, y + height / 2)`.
    pub fn center(&self) -> Point {
        Point::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }

    /// Clip the box to an image of the given size. Boxes that start outside the
    /// image collapse to zero area at the border.
    pub fn clip_to(&self, width: u32, height: u32) -> BoundingBox {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        BoundingBox::new(x, y, right - x, bottom - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_encloses_both_boxes() {
        let a = BoundingBox::new(50, 50, 20, 20);
        let b = BoundingBox::new(55, 55, 20, 20);
        let u = a.union(&b);
        assert_eq!(u, BoundingBox::new(50, 50, 25, 25));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn clip_keeps_box_inside_frame() {
        let b = BoundingBox::new(600, 470, 100, 100).clip_to(640, 480);
        assert_eq!(b, BoundingBox::new(600, 470, 40, 10));
        let outside = BoundingBox::new(700, 10, 5, 5).clip_to(640, 480);
        assert_eq!(outside.area(), 0);
    }

    #[test]
    fn center_uses_half_extents() {
        let c = BoundingBox::new(10, 20, 30, 41).center();
        assert_eq!(c, Point::new(25.0, 40.5));
    }
}
