// THEORY:
// This file is the main entry point for the `redlight_vision` library crate.
// It exposes the `GamePipeline` and its associated data structures
// (`PipelineConfig`, `FrameReport`, etc.) as the high-level interface of the
// engine, and the `FrameSource` trait through which frames are fed to it.
//
// The stages of the engine live in `core_modules`, leaves first:
// imaging -> motion_mask -> region_extractor -> entity_clusterer -> identity ->
// relevance -> motion_classifier. The pipeline wires them together, one frame at a
// time, and owns every piece of cross-frame state.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod source;

pub use config::PipelineConfig;
pub use error::{VisionError, VisionResult};
pub use pipeline::{DebugImages, FrameReport, GamePipeline, Light, Marker, Violation};
pub use source::{FrameSource, ImageSequenceSource, MemorySource};
