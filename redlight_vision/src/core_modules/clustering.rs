// THEORY:
// The `clustering` module hides "how do we decide which signatures belong
// together" behind a single capability, the `Clusterer` trait. The entity layer
// only ever asks for labels; it never knows which algorithm produced them.
//
// Two unsupervised backends are provided, neither of which needs the number of
// clusters up front:
// 1.  **Incremental (leader) clustering**: a single pass over the points. Each point
//     joins the first cluster whose running centroid lies within a fixed distance,
//     or founds a new one. Cheap and fully deterministic. The default distance is
//     Euclidean on raw histogram counts with a radius of 0.5, so only crops with
//     (almost) identical pixel content merge; crops of different sizes never do.
// 2.  **Affinity propagation**: points exchange "responsibility" and "availability"
//     messages over the similarity matrix until a stable set of exemplars emerges.
//     The preference value controls how eagerly points nominate themselves as
//     exemplars and therefore how many clusters form.
//
// Labels are always dense (`0..k`) and numbered in order of first appearance.

use crate::core_modules::signature::{AppearanceSignature, Similarity, SimilarityKind};
use serde::{Deserialize, Serialize};

/// Assigns a cluster label to every signature.
pub trait Clusterer: Send + Sync {
    fn name(&self) -> &'static str;

    /// One label per input, dense and in first-seen order.
    fn cluster(&self, signatures: &[AppearanceSignature]) -> Vec<usize>;
}

/// Renumbers arbitrary labels to `0..k` in order of first appearance.
fn densify(labels: &[usize]) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    labels
        .iter()
        .map(|label| match seen.iter().position(|s| s == label) {
            Some(i) => i,
            None => {
                seen.push(*label);
                seen.len() - 1
            }
        })
        .collect()
}

/// Single-pass leader clustering with a merge-distance threshold.
pub struct IncrementalClusterer {
    threshold: f64,
    metric: Box<dyn Similarity>,
}

impl IncrementalClusterer {
    pub fn new(threshold: f64, metric: Box<dyn Similarity>) -> Self {
        Self { threshold, metric }
    }
}

impl Clusterer for IncrementalClusterer {
    fn name(&self) -> &'static str {
        "incremental"
    }

    fn cluster(&self, signatures: &[AppearanceSignature]) -> Vec<usize> {
        // Running sums and member counts per cluster.
        let mut sums: Vec<Vec<f64>> = Vec::new();
        let mut counts: Vec<f64> = Vec::new();
        let mut labels = Vec::with_capacity(signatures.len());

        for signature in signatures {
            let joined = sums.iter().zip(&counts).position(|(sum, count)| {
                let centroid = AppearanceSignature::new(sum.iter().map(|v| v / count).collect());
                self.metric.distance(&centroid, signature) <= self.threshold
            });
            match joined {
                Some(index) => {
                    for (acc, value) in sums[index].iter_mut().zip(signature.values()) {
                        *acc += value;
                    }
                    counts[index] += 1.0;
                    labels.push(index);
                }
                None => {
                    sums.push(signature.values().to_vec());
                    counts.push(1.0);
                    labels.push(sums.len() - 1);
                }
            }
        }
        labels
    }
}

/// Self-similarity used on the diagonal of the affinity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// Median of the off-diagonal similarities.
    #[default]
    Median,
    Fixed(f64),
}

/// Exemplar-based clustering by message passing.
pub struct AffinityPropagation {
    damping: f64,
    preference: Preference,
    max_iterations: usize,
    convergence_iterations: usize,
    metric: Box<dyn Similarity>,
}

/// Scale of the index-proportional penalty that breaks exemplar ties in favor of
/// lower indices.
const TIE_BREAK: f64 = 1e-9;

impl AffinityPropagation {
    pub fn new(damping: f64, preference: Preference, metric: Box<dyn Similarity>) -> Self {
        Self {
            damping,
            preference,
            max_iterations: 200,
            convergence_iterations: 15,
            metric,
        }
    }

    pub fn with_iterations(mut self, max_iterations: usize, convergence_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self.convergence_iterations = convergence_iterations;
        self
    }

    fn similarity_matrix(&self, signatures: &[AppearanceSignature]) -> Vec<Vec<f64>> {
        let n = signatures.len();
        let mut s = vec![vec![0.0; n]; n];
        let mut off_diagonal = Vec::with_capacity(n * n.saturating_sub(1));
        for i in 0..n {
            for k in 0..n {
                if i != k {
                    s[i][k] = self.metric.similarity(&signatures[i], &signatures[k]);
                    off_diagonal.push(s[i][k]);
                }
            }
        }
        let preference = match self.preference {
            Preference::Fixed(value) => value,
            Preference::Median => median(&mut off_diagonal),
        };
        for (i, row) in s.iter_mut().enumerate() {
            row[i] = preference;
            for (k, value) in row.iter_mut().enumerate() {
                *value -= TIE_BREAK * k as f64;
            }
        }
        s
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

impl Clusterer for AffinityPropagation {
    fn name(&self) -> &'static str {
        "affinity_propagation"
    }

    fn cluster(&self, signatures: &[AppearanceSignature]) -> Vec<usize> {
        let n = signatures.len();
        if n < 2 {
            return vec![0; n];
        }
        let s = self.similarity_matrix(signatures);
        let mut r = vec![vec![0.0; n]; n];
        let mut a = vec![vec![0.0; n]; n];
        let mut exemplars: Vec<usize> = Vec::new();
        let mut stable_for = 0;

        for _ in 0..self.max_iterations {
            // Responsibilities: r(i,k) = s(i,k) - max_{k' != k} (a(i,k') + s(i,k')).
            for i in 0..n {
                let (mut best, mut second, mut best_k) = (f64::NEG_INFINITY, f64::NEG_INFINITY, 0);
                for k in 0..n {
                    let value = a[i][k] + s[i][k];
                    if value > best {
                        second = best;
                        best = value;
                        best_k = k;
                    } else if value > second {
                        second = value;
                    }
                }
                for k in 0..n {
                    let competitor = if k == best_k { second } else { best };
                    let fresh = s[i][k] - competitor;
                    r[i][k] = self.damping * r[i][k] + (1.0 - self.damping) * fresh;
                }
            }

            // Availabilities from the positive responsibilities of each column.
            for k in 0..n {
                let positive_sum: f64 = (0..n).filter(|&i| i != k).map(|i| r[i][k].max(0.0)).sum();
                for i in 0..n {
                    let fresh = if i == k {
                        positive_sum
                    } else {
                        (r[k][k] + positive_sum - r[i][k].max(0.0)).min(0.0)
                    };
                    a[i][k] = self.damping * a[i][k] + (1.0 - self.damping) * fresh;
                }
            }

            let current: Vec<usize> = (0..n).filter(|&k| a[k][k] + r[k][k] > 0.0).collect();
            if current == exemplars {
                stable_for += 1;
            } else {
                stable_for = 0;
                exemplars = current;
            }
            if stable_for >= self.convergence_iterations && !exemplars.is_empty() {
                break;
            }
        }

        if exemplars.is_empty() {
            return vec![0; n];
        }
        let labels: Vec<usize> = (0..n)
            .map(|i| {
                if exemplars.contains(&i) {
                    return i;
                }
                exemplars
                    .iter()
                    .copied()
                    .max_by(|&x, &y| s[i][x].total_cmp(&s[i][y]).then(y.cmp(&x)))
                    .unwrap_or(i)
            })
            .collect();
        densify(&labels)
    }
}

fn default_threshold() -> f64 {
    0.5
}

/// Raw-count Euclidean radius: only near-identical crops merge.
fn default_incremental_metric() -> SimilarityKind {
    SimilarityKind::Euclidean
}

fn default_damping() -> f64 {
    0.8
}

fn default_max_iterations() -> usize {
    200
}

fn default_convergence_iterations() -> usize {
    15
}

/// Clustering backend selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClusteringConfig {
    Incremental {
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default = "default_incremental_metric")]
        metric: SimilarityKind,
    },
    AffinityPropagation {
        #[serde(default = "default_damping")]
        damping: f64,
        #[serde(default)]
        preference: Preference,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
        #[serde(default = "default_convergence_iterations")]
        convergence_iterations: usize,
        #[serde(default)]
        metric: SimilarityKind,
    },
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig::Incremental {
            threshold: default_threshold(),
            metric: default_incremental_metric(),
        }
    }
}

impl ClusteringConfig {
    pub fn build(&self) -> Box<dyn Clusterer> {
        match self {
            ClusteringConfig::Incremental { threshold, metric } => {
                Box::new(IncrementalClusterer::new(*threshold, metric.build()))
            }
            ClusteringConfig::AffinityPropagation {
                damping,
                preference,
                max_iterations,
                convergence_iterations,
                metric,
            } => Box::new(
                AffinityPropagation::new(*damping, *preference, metric.build())
                    .with_iterations(*max_iterations, *convergence_iterations),
            ),
        }
    }
}
