// THEORY:
// A person crossing the frame rarely shows up as one clean blob: arms, legs and
// clothing break the motion mask into fragments. The `EntityClusterer` glues those
// fragments back together by appearance. Every region gets a signature, the
// signatures are clustered, and each cluster is reported as the single box that
// encloses all of its members.
//
// Fewer than two regions cannot be clustered and are returned untouched. When the
// clusterer finds no structure at all, the whole frame collapses into one entity;
// that is an expected outcome, not a failure.

use crate::core_modules::clustering::Clusterer;
use crate::core_modules::geometry::BoundingBox;
use crate::core_modules::signature::{AppearanceSignature, SignatureExtractor};
use image::RgbImage;
use rayon::prelude::*;

/// Groups raw regions into entities.
pub struct EntityClusterer {
    extractor: SignatureExtractor,
    clusterer: Box<dyn Clusterer>,
    parallel: bool,
}

impl EntityClusterer {
    pub fn new(extractor: SignatureExtractor, clusterer: Box<dyn Clusterer>) -> Self {
        Self {
            extractor,
            clusterer,
            parallel: false,
        }
    }

    /// Compute region signatures on the rayon pool. Order is preserved, so labels
    /// do not depend on scheduling.
    pub fn with_parallel_signatures(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn signatures(&self, regions: &[BoundingBox], frame: &RgbImage) -> Vec<AppearanceSignature> {
        if self.parallel {
            regions
                .par_iter()
                .map(|region| self.extractor.extract(frame, region))
                .collect()
        } else {
            regions
                .iter()
                .map(|region| self.extractor.extract(frame, region))
                .collect()
        }
    }

    /// One union box per discovered entity, ordered by cluster label.
    pub fn cluster(&self, regions: &[BoundingBox], frame: &RgbImage) -> Vec<BoundingBox> {
        if regions.len() <= 1 {
            return regions.to_vec();
        }
        let signatures = self.signatures(regions, frame);
        let labels = self.clusterer.cluster(&signatures);
        union_boxes(regions, &labels)
    }
}

/// Merges each label's member boxes into their enclosing box.
pub fn union_boxes(regions: &[BoundingBox], labels: &[usize]) -> Vec<BoundingBox> {
    let cluster_count = labels.iter().max().map_or(0, |max| max + 1);
    let mut entities: Vec<Option<BoundingBox>> = vec![None; cluster_count];
    for (region, &label) in regions.iter().zip(labels) {
        let merged = match entities[label] {
            Some(existing) => existing.union(region),
            None => *region,
        };
        entities[label] = Some(merged);
    }
    entities.into_iter().flatten().collect()
}
