// THEORY:
// The `signature` module gives every region an appearance fingerprint. The same
// fingerprint drives two decisions: which fragments of a frame belong together
// (clustering) and which persistent identity a fragment belongs to (matching).
//
// The extractor and the similarity metric are both swappable: the extractor is
// chosen by `SignatureKind`, the metric by the `Similarity` trait. One session must
// stick to a single kind, because signatures of different lengths are meaningless
// to compare.

use crate::core_modules::geometry::BoundingBox;
use crate::core_modules::imaging;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A fixed-length appearance vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppearanceSignature(pub Vec<f64>);

impl AppearanceSignature {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Element-wise arithmetic mean of two signatures of equal length.
    pub fn blend(&self, other: &AppearanceSignature) -> AppearanceSignature {
        AppearanceSignature(
            self.0
                .iter()
                .zip(&other.0)
                .map(|(a, b)| (a + b) / 2.0)
                .collect(),
        )
    }
}

/// Which features make up a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// 256-bin intensity histogram of the crop.
    #[default]
    Histogram,
    /// Histogram followed by the box center `(x, y)` in pixels.
    HistogramWithPosition,
}

impl SignatureKind {
    pub fn dimensions(&self) -> usize {
        match self {
            SignatureKind::Histogram => 256,
            SignatureKind::HistogramWithPosition => 258,
        }
    }
}

/// Builds signatures of one kind from regions of a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureExtractor {
    kind: SignatureKind,
}

impl SignatureExtractor {
    pub fn new(kind: SignatureKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    pub fn extract(&self, frame: &RgbImage, bounds: &BoundingBox) -> AppearanceSignature {
        let mut values = imaging::histogram256(&imaging::crop(frame, bounds));
        if self.kind == SignatureKind::HistogramWithPosition {
            let center = bounds.center();
            values.push(center.x);
            values.push(center.y);
        }
        AppearanceSignature(values)
    }
}

/// A similarity score between two signatures, higher meaning more alike.
pub trait Similarity: Send + Sync {
    fn name(&self) -> &'static str;

    fn similarity(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> f64;

    /// Distance derived from the similarity, `1 - similarity`.
    fn distance(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> f64 {
        1.0 - self.similarity(a, b)
    }
}

/// Cosine of the angle between two vectors. Zero vectors score 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl Similarity for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn similarity(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> f64 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f64 = a.0.iter().zip(&b.0).map(|(x, y)| x * y).sum();
        let norm_a = a.0.iter().map(|x| x * x).sum::<f64>().sqrt();
        let norm_b = b.0.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

/// Histogram intersection normalised by the smaller total mass, in `[0, 1]` for
/// non-negative vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramIntersection;

impl Similarity for HistogramIntersection {
    fn name(&self) -> &'static str {
        "histogram_intersection"
    }

    fn similarity(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> f64 {
        if a.len() != b.len() {
            return 0.0;
        }
        let overlap: f64 = a.0.iter().zip(&b.0).map(|(x, y)| x.min(*y)).sum();
        let mass = a.0.iter().sum::<f64>().min(b.0.iter().sum::<f64>());
        if mass <= 0.0 {
            return 0.0;
        }
        overlap / mass
    }
}

/// Straight-line distance between raw vectors. The similarity is the negated
/// squared distance, so identical signatures score 0.0 and everything else scores
/// below it; `distance` is the plain Euclidean distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Euclidean {
    fn squared(a: &AppearanceSignature, b: &AppearanceSignature) -> f64 {
        if a.len() != b.len() {
            return f64::INFINITY;
        }
        a.0.iter().zip(&b.0).map(|(x, y)| (x - y).powi(2)).sum()
    }
}

impl Similarity for Euclidean {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn similarity(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> f64 {
        -Self::squared(a, b)
    }

    fn distance(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> f64 {
        Self::squared(a, b).sqrt()
    }
}

/// Metric selection for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    #[default]
    Cosine,
    HistogramIntersection,
    Euclidean,
}

impl SimilarityKind {
    pub fn build(&self) -> Box<dyn Similarity> {
        match self {
            SimilarityKind::Cosine => Box::new(Cosine),
            SimilarityKind::HistogramIntersection => Box::new(HistogramIntersection),
            SimilarityKind::Euclidean => Box::new(Euclidean),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sig(values: &[f64]) -> AppearanceSignature {
        AppearanceSignature::new(values.to_vec())
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let s = Cosine.similarity(&sig(&[1.0, 2.0, 3.0]), &sig(&[2.0, 4.0, 6.0]));
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(Cosine.similarity(&sig(&[0.0, 0.0]), &sig(&[1.0, 1.0])), 0.0);
        assert_eq!(Cosine.similarity(&sig(&[1.0]), &sig(&[1.0, 1.0])), 0.0);
    }

    #[test]
    fn intersection_of_identical_histograms_is_one() {
        let a = sig(&[3.0, 0.0, 1.0]);
        assert_eq!(HistogramIntersection.similarity(&a, &a), 1.0);
        assert_eq!(
            HistogramIntersection.similarity(&a, &sig(&[0.0, 4.0, 0.0])),
            0.0
        );
    }

    #[test]
    fn euclidean_works_on_raw_counts() {
        let a = sig(&[3.0, 0.0]);
        assert_eq!(Euclidean.distance(&a, &sig(&[0.0, 4.0])), 5.0);
        assert_eq!(Euclidean.similarity(&a, &sig(&[0.0, 4.0])), -25.0);
        assert_eq!(Euclidean.distance(&a, &a), 0.0);
        assert_eq!(Euclidean.distance(&a, &sig(&[3.0])), f64::INFINITY);
        assert_eq!(SimilarityKind::Euclidean.build().name(), "euclidean");
    }

    #[test]
    fn blend_is_elementwise_mean() {
        assert_eq!(sig(&[2.0, 4.0]).blend(&sig(&[4.0, 0.0])), sig(&[3.0, 2.0]));
    }

    #[test]
    fn position_variant_appends_center() {
        let frame = RgbImage::from_pixel(40, 40, Rgb([7, 7, 7]));
        let bounds = BoundingBox::new(10, 20, 4, 6);
        let plain = SignatureExtractor::new(SignatureKind::Histogram).extract(&frame, &bounds);
        let with_pos =
            SignatureExtractor::new(SignatureKind::HistogramWithPosition).extract(&frame, &bounds);
        assert_eq!(plain.len(), SignatureKind::Histogram.dimensions());
        assert_eq!(with_pos.len(), SignatureKind::HistogramWithPosition.dimensions());
        assert_eq!(plain.values()[7], 72.0);
        assert_eq!(&with_pos.values()[256..], &[12.0, 23.0]);
    }
}
