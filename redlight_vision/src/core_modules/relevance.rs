//! Heuristic filter separating plausible players from noise blobs.

use crate::core_modules::geometry::BoundingBox;
use crate::core_modules::identity::TrackedIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// A lone rectangle must be wider or taller than this to count as a player.
    pub breakpoint: u32,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self { breakpoint: 500 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceFilter {
    config: RelevanceConfig,
}

impl RelevanceFilter {
    pub fn new(config: RelevanceConfig) -> Self {
        Self { config }
    }

    /// Decides relevance from this frame's rectangles only.
    ///
    /// Several simultaneous detections suggest a body breaking into fragments, so
    /// they are relevant regardless of size. A single detection has to be large.
    pub fn is_relevant(&self, identity: &TrackedIdentity, rectangles: &[BoundingBox]) -> bool {
        if identity.is_out {
            return false;
        }
        match rectangles {
            [] => false,
            [only] => only.width > self.config.breakpoint || only.height > self.config.breakpoint,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::identity::{MatchConfig, Roster};
    use crate::core_modules::signature::AppearanceSignature;

    fn identity() -> TrackedIdentity {
        let mut roster = Roster::new(&MatchConfig::default(), Some(1));
        roster.match_signature(&AppearanceSignature::new(vec![1.0]));
        roster.identities()[0].clone()
    }

    #[test]
    fn several_rectangles_are_relevant_regardless_of_size() {
        let rects = [BoundingBox::new(0, 0, 1, 1), BoundingBox::new(5, 5, 2, 2)];
        assert!(RelevanceFilter::default().is_relevant(&identity(), &rects));
    }

    #[test]
    fn single_rectangle_must_exceed_breakpoint() {
        let filter = RelevanceFilter::default();
        let who = identity();
        assert!(!filter.is_relevant(&who, &[BoundingBox::new(0, 0, 10, 10)]));
        assert!(filter.is_relevant(&who, &[BoundingBox::new(0, 0, 600, 10)]));
        assert!(filter.is_relevant(&who, &[BoundingBox::new(0, 0, 10, 501)]));
        assert!(!filter.is_relevant(&who, &[BoundingBox::new(0, 0, 500, 500)]));
    }

    #[test]
    fn out_and_unseen_identities_are_not_relevant() {
        let filter = RelevanceFilter::default();
        let mut who = identity();
        assert!(!filter.is_relevant(&who, &[]));
        who.is_out = true;
        let rects = [BoundingBox::new(0, 0, 1, 1), BoundingBox::new(5, 5, 2, 2)];
        assert!(!filter.is_relevant(&who, &rects));
    }
}
