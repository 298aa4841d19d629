// THEORY:
// The `identity` module adds memory to the engine. Entities are recomputed from
// scratch every frame; a `TrackedIdentity` is what survives between frames and lets
// the game say "this is the same player as before".
//
// Re-identification is purely appearance based. An incoming signature is compared
// against the roster in order, and the FIRST identity whose similarity exceeds the
// match threshold wins, even if a later one would score higher. The matched
// identity's signature then drifts toward the new observation by averaging the
// two. Unmatched signatures register a new identity with a fresh display color.
//
// Lifecycle:
// - **Birth**: no roster entry is similar enough.
// - **Tracking**: a match blends the signature and resets `frames_since_seen`.
// - **Out**: `mark_out` sets a permanent flag; the identity stays in the roster but
//   can never be relevant again.
// - **Eviction**: only when the orchestrator explicitly asks for it. By default the
//   roster only grows.

use crate::core_modules::geometry::Point;
use crate::core_modules::signature::{AppearanceSignature, Similarity, SimilarityKind};
use image::Rgb;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

pub type Color = Rgb<u8>;

/// Matching policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Similarities strictly above this value count as a match.
    pub threshold: f64,
    pub metric: SimilarityKind,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            metric: SimilarityKind::Cosine,
        }
    }
}

/// A player remembered across frames.
#[derive(Debug, Clone)]
pub struct TrackedIdentity {
    /// Persistent id, never reused within a roster.
    pub id: u64,
    /// Running appearance signature.
    pub signature: AppearanceSignature,
    pub is_relevant: bool,
    pub is_out: bool,
    pub center_of_mass: Point,
    pub previous_center_of_mass: Point,
    /// Display color, fixed at registration.
    pub color: Color,
    /// Number of frames in which this identity was matched, including its birth.
    pub age: u32,
    pub frames_since_seen: u32,
}

impl TrackedIdentity {
    fn new(id: u64, signature: AppearanceSignature, color: Color) -> Self {
        Self {
            id,
            signature,
            is_relevant: false,
            is_out: false,
            center_of_mass: Point::default(),
            previous_center_of_mass: Point::default(),
            color,
            age: 1,
            frames_since_seen: 0,
        }
    }

    fn absorb(&mut self, signature: &AppearanceSignature) {
        self.signature = self.signature.blend(signature);
        self.age += 1;
        self.frames_since_seen = 0;
    }
}

/// The ordered, append-only list of identities and the matcher that feeds it.
pub struct Roster {
    identities: Vec<TrackedIdentity>,
    threshold: f64,
    metric: Box<dyn Similarity>,
    rng: StdRng,
    next_id: u64,
}

impl Roster {
    pub fn new(config: &MatchConfig, color_seed: Option<u64>) -> Self {
        let rng = match color_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            identities: Vec::new(),
            threshold: config.threshold,
            metric: config.metric.build(),
            rng,
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn identities(&self) -> &[TrackedIdentity] {
        &self.identities
    }

    pub fn get(&self, index: usize) -> Option<&TrackedIdentity> {
        self.identities.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TrackedIdentity> {
        self.identities.get_mut(index)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedIdentity> {
        self.identities.iter_mut()
    }

    /// Returns the index of the identity this signature belongs to, registering a
    /// new identity when none matches.
    pub fn match_signature(&mut self, signature: &AppearanceSignature) -> usize {
        let matched = self
            .identities
            .iter()
            .position(|identity| self.metric.similarity(&identity.signature, signature) > self.threshold);

        match matched {
            Some(index) => {
                self.identities[index].absorb(signature);
                index
            }
            None => self.register(signature.clone()),
        }
    }

    fn register(&mut self, signature: AppearanceSignature) -> usize {
        let color = Rgb([
            self.rng.gen_range(0..=255),
            self.rng.gen_range(0..=255),
            self.rng.gen_range(0..=255),
        ]);
        let id = self.next_id;
        self.next_id += 1;
        self.identities.push(TrackedIdentity::new(id, signature, color));
        info!(identity = id, roster_size = self.identities.len(), "registered new identity");
        self.identities.len() - 1
    }

    /// Ages every identity by one frame. Call once per frame before matching.
    pub fn advance_frame(&mut self) {
        for identity in &mut self.identities {
            identity.frames_since_seen = identity.frames_since_seen.saturating_add(1);
        }
    }

    /// Permanently excludes an identity from relevance.
    pub fn mark_out(&mut self, index: usize) -> bool {
        match self.identities.get_mut(index) {
            Some(identity) => {
                identity.is_out = true;
                true
            }
            None => false,
        }
    }

    /// Removes identities unseen for more than `max_unseen` frames and returns them.
    /// Indices of the remaining identities shift down.
    pub fn evict_stale(&mut self, max_unseen: u32) -> Vec<TrackedIdentity> {
        let (kept, evicted): (Vec<_>, Vec<_>) = self
            .identities
            .drain(..)
            .partition(|identity| identity.frames_since_seen <= max_unseen);
        self.identities = kept;
        for identity in &evicted {
            info!(identity = identity.id, "evicted stale identity");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(values: &[f64]) -> AppearanceSignature {
        AppearanceSignature::new(values.to_vec())
    }

    fn roster() -> Roster {
        Roster::new(&MatchConfig::default(), Some(7))
    }

    #[test]
    fn first_signature_registers_identity_zero() {
        let mut roster = roster();
        assert_eq!(roster.match_signature(&sig(&[1.0, 0.0, 0.0])), 0);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.identities()[0].signature, sig(&[1.0, 0.0, 0.0]));
    }

    #[test]
    fn first_match_wins_over_best_match() {
        let mut roster = roster();
        roster.match_signature(&sig(&[0.0, 0.0, 1.0]));
        roster.match_signature(&sig(&[1.0, 0.5, 0.0]));
        roster.match_signature(&sig(&[1.0, 0.0, 0.5]));
        assert_eq!(roster.len(), 3);

        // Scores ~0.890 against index 1 and ~0.934 against index 2.
        let index = roster.match_signature(&sig(&[1.0, 0.0, 0.1]));
        assert_eq!(index, 1);
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.identities()[1].signature, sig(&[1.0, 0.25, 0.05]));
        assert_eq!(roster.identities()[2].signature, sig(&[1.0, 0.0, 0.5]));
        assert_eq!(roster.identities()[1].age, 2);
    }

    #[test]
    fn roster_never_shrinks_while_matching() {
        let mut roster = roster();
        let mut last = 0;
        for i in 0..20 {
            let angle = i as f64 * 0.4;
            roster.match_signature(&sig(&[angle.cos().abs(), angle.sin().abs(), 0.1]));
            assert!(roster.len() >= last);
            last = roster.len();
        }
    }

    #[test]
    fn seeded_colors_are_reproducible() {
        let mut a = roster();
        let mut b = roster();
        a.match_signature(&sig(&[1.0]));
        b.match_signature(&sig(&[1.0]));
        assert_eq!(a.identities()[0].color, b.identities()[0].color);
    }

    #[test]
    fn ids_are_not_reused_after_eviction() {
        let mut roster = roster();
        roster.match_signature(&sig(&[1.0, 0.0]));
        roster.match_signature(&sig(&[0.0, 1.0]));
        for _ in 0..3 {
            roster.advance_frame();
        }
        roster.match_signature(&sig(&[0.0, 1.0]));
        let evicted = roster.evict_stale(2);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, 0);
        assert_eq!(roster.len(), 1);

        let index = roster.match_signature(&sig(&[1.0, 0.0]));
        assert_eq!(roster.identities()[index].id, 2);
    }

    #[test]
    fn mark_out_is_permanent_flag() {
        let mut roster = roster();
        roster.match_signature(&sig(&[1.0]));
        assert!(roster.mark_out(0));
        assert!(!roster.mark_out(5));
        roster.match_signature(&sig(&[1.0]));
        assert!(roster.identities()[0].is_out);
    }
}
