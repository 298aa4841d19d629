pub mod accumulator;
pub mod clustering;
pub mod entity_clusterer;
pub mod geometry;
pub mod identity;
pub mod imaging;
pub mod motion_classifier;
pub mod motion_mask;
pub mod region_extractor;
pub mod relevance;
pub mod signature;
