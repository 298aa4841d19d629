// THEORY:
// The `FrameAccumulator` collects, for one frame only, which raw rectangles were
// attributed to which identity. It is owned by the orchestrator and cleared at the
// start of every frame, so nothing attributed in one frame can leak into the next.

use crate::core_modules::geometry::BoundingBox;
use std::collections::BTreeMap;

/// Rectangles attributed to each roster index during the current frame.
#[derive(Debug, Clone, Default)]
pub struct FrameAccumulator {
    rectangles: BTreeMap<usize, Vec<BoundingBox>>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity_index: usize, rectangle: BoundingBox) {
        self.rectangles.entry(identity_index).or_default().push(rectangle);
    }

    /// Rectangles for an identity; empty when it was not seen this frame.
    pub fn rectangles(&self, identity_index: usize) -> &[BoundingBox] {
        self.rectangles
            .get(&identity_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.rectangles.is_empty()
    }

    pub fn clear(&mut self) {
        self.rectangles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_per_identity_and_clears() {
        let mut acc = FrameAccumulator::new();
        acc.push(1, BoundingBox::new(0, 0, 1, 1));
        acc.push(1, BoundingBox::new(5, 5, 1, 1));
        acc.push(3, BoundingBox::new(9, 9, 1, 1));
        assert_eq!(acc.rectangles(1).len(), 2);
        assert_eq!(acc.rectangles(3).len(), 1);
        assert!(acc.rectangles(2).is_empty());
        acc.clear();
        assert!(acc.is_empty());
        assert!(acc.rectangles(1).is_empty());
    }
}
