// THEORY:
// The `pipeline` module is the top-level API of the engine. `GamePipeline` owns every
// stage and every piece of state that outlives a frame: the blurred baseline, the
// previous frame, the identity roster and the current light. A caller feeds it one
// frame at a time and gets back a `FrameReport` describing what the game should
// draw and who broke the rules.
//
// One frame flows through the stages strictly in order:
// 1.  **Mask**: background differencing against the baseline/previous blend, or
//     color keying when configured.
// 2.  **Regions**: outer connected components of the mask.
// 3.  **Entities**: regions grouped by appearance into union boxes.
// 4.  **Identities**: each entity is matched against the roster, and its box is
//     accumulated under the matched identity for this frame only.
// 5.  **Relevance**: every identity is re-judged from this frame's rectangles.
// 6.  **Motion**: relevant identities get a moving/still verdict. Under a red light
//     a moving verdict is a violation.
//
// The very first frame becomes both the baseline and the previous frame, so it
// produces an (almost) empty mask.

use crate::config::PipelineConfig;
use crate::core_modules::accumulator::FrameAccumulator;
use crate::core_modules::entity_clusterer::EntityClusterer;
use crate::core_modules::geometry::{BoundingBox, Point};
use crate::core_modules::identity::{Color, Roster};
use crate::core_modules::motion_classifier::MotionClassifier;
use crate::core_modules::motion_mask::{MaskSource, MotionMask};
use crate::core_modules::region_extractor::RegionExtractor;
use crate::core_modules::relevance::RelevanceFilter;
use crate::core_modules::signature::SignatureExtractor;
use crate::error::{VisionError, VisionResult};
use crate::source::FrameSource;
use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing::{debug, warn};

pub const MOVING_COLOR: Color = Rgb([255, 0, 0]);
pub const STILL_COLOR: Color = Rgb([0, 255, 0]);

/// The game's light. Moving under a red light is a violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Light {
    #[default]
    Green,
    Red,
}

/// Center marker for one relevant identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub identity_id: u64,
    pub center: Point,
    pub moving: bool,
    /// Red when moving, green when still.
    pub color: Color,
}

/// A relevant identity caught moving under a red light.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub identity_id: u64,
    pub center: Point,
}

#[derive(Debug, Clone)]
pub struct DebugImages {
    pub blend: GrayImage,
    pub diff: GrayImage,
    pub mask: GrayImage,
}

/// Everything the pipeline decided about one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Entity boxes whose identity is relevant, in that identity's color.
    pub entities: Vec<(BoundingBox, Color)>,
    pub markers: Vec<Marker>,
    pub violations: Vec<Violation>,
    pub debug: Option<DebugImages>,
}

/// Prepared frames carried over from the previous call.
struct FrameHistory {
    baseline: GrayImage,
    previous: GrayImage,
    previous_motion: GrayImage,
}

pub struct GamePipeline {
    config: PipelineConfig,
    mask: MotionMask,
    regions: RegionExtractor,
    entities: EntityClusterer,
    extractor: SignatureExtractor,
    roster: Roster,
    relevance: RelevanceFilter,
    motion: MotionClassifier,
    accumulator: FrameAccumulator,
    history: Option<FrameHistory>,
    light: Light,
    frame_index: u64,
}

impl GamePipeline {
    pub fn new(config: PipelineConfig) -> VisionResult<Self> {
        config.validate()?;
        let extractor = SignatureExtractor::new(config.signature);
        Ok(Self {
            mask: MotionMask::new(config.mask.clone()),
            regions: RegionExtractor::new(config.regions.clone()),
            entities: EntityClusterer::new(extractor, config.clustering.build())
                .with_parallel_signatures(config.parallel_signatures),
            extractor,
            roster: Roster::new(&config.matching, config.color_seed),
            relevance: RelevanceFilter::new(config.relevance.clone()),
            motion: MotionClassifier::new(config.motion.clone()),
            accumulator: FrameAccumulator::new(),
            history: None,
            light: Light::Green,
            frame_index: 0,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn light(&self) -> Light {
        self.light
    }

    pub fn set_light(&mut self, light: Light) {
        if light != self.light {
            debug!(?light, "light changed");
        }
        self.light = light;
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Permanently excludes the identity with this id. Returns `false` for an
    /// unknown id.
    pub fn mark_out(&mut self, identity_id: u64) -> bool {
        match self.roster.identities().iter().position(|i| i.id == identity_id) {
            Some(index) => self.roster.mark_out(index),
            None => false,
        }
    }

    /// Gray, blurred versions of `frame` for the mask and for the motion band. The
    /// blur is shared when both stages use the same kernel.
    fn prepare(&self, frame: &RgbImage) -> VisionResult<(GrayImage, GrayImage)> {
        let current = self.mask.prepare(frame)?;
        let current_motion = if self.config.motion.blur_kernel == self.config.mask.blur_kernel {
            current.clone()
        } else {
            self.motion.prepare(frame)?
        };
        Ok((current, current_motion))
    }

    pub fn process_frame(&mut self, frame: &RgbImage) -> VisionResult<FrameReport> {
        let (current, current_motion) = self.prepare(frame)?;
        let history = self.history.get_or_insert_with(|| FrameHistory {
            baseline: current.clone(),
            previous: current.clone(),
            previous_motion: current_motion.clone(),
        });
        VisionError::check_dimensions(
            "pipeline frame",
            history.baseline.dimensions(),
            current.dimensions(),
        )?;

        // Stage 1-3: pixels to entities.
        let mask = match &self.config.mask_source {
            MaskSource::Motion => {
                self.mask
                    .compute_prepared(&history.baseline, &history.previous, &current)?
            }
            MaskSource::ColorRange(keying) => keying.compute_output(frame),
        };
        let regions = self.regions.extract(&mask.mask);
        let entities = self.entities.cluster(&regions, frame);

        // Stage 4: re-identification and per-frame accumulation.
        self.accumulator.clear();
        self.roster.advance_frame();
        let mut matched = Vec::with_capacity(entities.len());
        for entity in &entities {
            let signature = self.extractor.extract(frame, entity);
            let index = self.roster.match_signature(&signature);
            self.accumulator.push(index, *entity);
            matched.push((*entity, index));
        }

        // Stage 5: relevance from this frame's rectangles.
        for (index, identity) in self.roster.iter_mut().enumerate() {
            identity.is_relevant = self
                .relevance
                .is_relevant(identity, self.accumulator.rectangles(index));
        }

        // Stage 6: motion for relevant identities.
        let mut markers = Vec::new();
        let mut violations = Vec::new();
        for (index, identity) in self.roster.iter_mut().enumerate() {
            if !identity.is_relevant {
                continue;
            }
            let moving = self.motion.is_moving(
                identity,
                self.accumulator.rectangles(index),
                &history.previous_motion,
                &current_motion,
            )?;
            markers.push(Marker {
                identity_id: identity.id,
                center: identity.center_of_mass,
                moving,
                color: if moving { MOVING_COLOR } else { STILL_COLOR },
            });
            if moving && self.light == Light::Red {
                warn!(
                    frame = self.frame_index,
                    identity = identity.id,
                    x = identity.center_of_mass.x,
                    y = identity.center_of_mass.y,
                    "moved under red light"
                );
                violations.push(Violation {
                    identity_id: identity.id,
                    center: identity.center_of_mass,
                });
            }
        }

        let drawn: Vec<(BoundingBox, Color)> = matched
            .iter()
            .filter_map(|&(entity, index)| {
                self.roster
                    .get(index)
                    .filter(|identity| identity.is_relevant)
                    .map(|identity| (entity, identity.color))
            })
            .collect();

        debug!(
            frame = self.frame_index,
            regions = regions.len(),
            entities = entities.len(),
            relevant = markers.len(),
            roster = self.roster.len(),
            "processed frame"
        );

        if let Some(max_unseen) = self.config.eviction.max_unseen_frames {
            self.roster.evict_stale(max_unseen);
        }

        history.previous = current;
        history.previous_motion = current_motion;

        let report = FrameReport {
            frame_index: self.frame_index,
            entities: drawn,
            markers,
            violations,
            debug: self.config.debug_images.then(|| DebugImages {
                blend: mask.blend,
                diff: mask.diff,
                mask: mask.mask,
            }),
        };
        self.frame_index += 1;
        Ok(report)
    }
}

/// Drives `source` through `pipeline` until end-of-stream or until `on_report`
/// breaks. Returns the number of frames processed.
pub fn run<S>(
    source: &mut S,
    pipeline: &mut GamePipeline,
    mut on_report: impl FnMut(&RgbImage, &FrameReport) -> ControlFlow<()>,
) -> VisionResult<u64>
where
    S: FrameSource + ?Sized,
{
    let mut processed = 0;
    while let Some(frame) = source.next_frame()? {
        let report = pipeline.process_frame(&frame)?;
        processed += 1;
        if on_report(&frame, &report).is_break() {
            break;
        }
    }
    Ok(processed)
}
