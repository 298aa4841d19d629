//! Pipeline configuration.
//!
//! Every stage reads its constants from here. Configuration can be built in code
//! (`PipelineConfig::default()`, `PipelineConfig::arena()`) or loaded from TOML;
//! omitted keys fall back to the defaults of the primary player-tracking setup.

use crate::core_modules::clustering::ClusteringConfig;
use crate::core_modules::identity::MatchConfig;
use crate::core_modules::motion_classifier::MotionConfig;
use crate::core_modules::motion_mask::{MaskConfig, MaskSource};
use crate::core_modules::region_extractor::RegionConfig;
use crate::core_modules::relevance::RelevanceConfig;
use crate::core_modules::signature::SignatureKind;
use crate::error::{VisionError, VisionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional roster eviction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Identities unseen for more than this many frames are dropped. `None`
    /// keeps every identity forever.
    pub max_unseen_frames: Option<u32>,
}

/// Configuration for the `GamePipeline`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mask_source: MaskSource,
    pub mask: MaskConfig,
    pub regions: RegionConfig,
    pub signature: SignatureKind,
    pub clustering: ClusteringConfig,
    pub matching: MatchConfig,
    pub relevance: RelevanceConfig,
    pub motion: MotionConfig,
    pub eviction: EvictionConfig,
    /// Seed for identity display colors. `None` draws from OS entropy.
    pub color_seed: Option<u64>,
    /// Compute region signatures on the rayon thread pool.
    pub parallel_signatures: bool,
    /// Return blend, diff and mask images with every report.
    pub debug_images: bool,
}

impl PipelineConfig {
    /// The coarse arena setup: baseline-only differencing with a wide blur and
    /// small blobs filtered out before clustering.
    pub fn arena() -> Self {
        Self {
            mask: MaskConfig::baseline_only(),
            regions: RegionConfig {
                min_area: Some(3000),
            },
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> VisionResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> VisionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects values no stage can work with.
    pub fn validate(&self) -> VisionResult<()> {
        for (name, kernel) in [
            ("mask.blur_kernel", self.mask.blur_kernel),
            ("motion.blur_kernel", self.motion.blur_kernel),
        ] {
            if !kernel.is_valid() {
                return Err(VisionError::config(format!(
                    "{name} must have odd width and height, got {}x{}",
                    kernel.width, kernel.height
                )));
            }
        }
        if !(self.mask.baseline_weight.is_finite()
            && self.mask.previous_weight.is_finite()
            && self.mask.bias.is_finite())
        {
            return Err(VisionError::config("mask weights and bias must be finite"));
        }
        if let MaskSource::ColorRange(keying) = &self.mask_source {
            if !keying.is_valid() {
                return Err(VisionError::config(format!(
                    "mask_source lower bound {:?} exceeds upper bound {:?}",
                    keying.lower, keying.upper
                )));
            }
        }
        if !(-1.0..=1.0).contains(&self.matching.threshold) {
            return Err(VisionError::config(format!(
                "matching.threshold must lie in [-1, 1], got {}",
                self.matching.threshold
            )));
        }
        match &self.clustering {
            ClusteringConfig::Incremental { threshold, .. } => {
                if !threshold.is_finite() || *threshold < 0.0 {
                    return Err(VisionError::config(format!(
                        "clustering.threshold must be a non-negative number, got {threshold}"
                    )));
                }
            }
            ClusteringConfig::AffinityPropagation {
                damping,
                max_iterations,
                ..
            } => {
                if !(0.5..1.0).contains(damping) {
                    return Err(VisionError::config(format!(
                        "clustering.damping must lie in [0.5, 1), got {damping}"
                    )));
                }
                if *max_iterations == 0 {
                    return Err(VisionError::config("clustering.max_iterations must be positive"));
                }
            }
        }
        if !self.motion.displacement_threshold.is_finite() || self.motion.displacement_threshold < 0.0 {
            return Err(VisionError::config("motion.displacement_threshold must be non-negative"));
        }
        if !self.motion.subtraction_ratio.is_finite() || self.motion.subtraction_ratio < 0.0 {
            return Err(VisionError::config("motion.subtraction_ratio must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::clustering::Preference;
    use crate::core_modules::imaging::KernelSize;
    use crate::core_modules::motion_mask::ColorRangeMask;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() -> VisionResult<()> {
        let config = PipelineConfig::from_toml_str("")?;
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.matching.threshold, 0.85);
        assert_eq!(config.relevance.breakpoint, 500);
        assert_eq!(config.mask.threshold, 25);
        Ok(())
    }

    #[test]
    fn nested_sections_override_defaults() -> VisionResult<()> {
        let config = PipelineConfig::from_toml_str(
            r#"
            signature = "histogram_with_position"
            color_seed = 11

            [mask]
            threshold = 50
            blur_kernel = { width = 51, height = 151 }

            [regions]
            min_area = 3000

            [clustering]
            algorithm = "affinity_propagation"
            preference = { fixed = 0.5 }

            [matching]
            threshold = 0.6
            "#,
        )?;
        assert_eq!(config.signature, SignatureKind::HistogramWithPosition);
        assert_eq!(config.mask.threshold, 50);
        assert_eq!(config.mask.blur_kernel, KernelSize::new(51, 151));
        assert_eq!(config.mask.dilate_iterations, 2);
        assert_eq!(config.regions.min_area, Some(3000));
        assert_eq!(config.matching.threshold, 0.6);
        assert_eq!(config.color_seed, Some(11));
        match config.clustering {
            ClusteringConfig::AffinityPropagation {
                damping, preference, ..
            } => {
                assert_eq!(damping, 0.8);
                assert_eq!(preference, Preference::Fixed(0.5));
            }
            other => panic!("unexpected clustering config {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        let even_kernel = "[mask]\nblur_kernel = { width = 10, height = 51 }";
        assert!(matches!(
            PipelineConfig::from_toml_str(even_kernel),
            Err(VisionError::Config(_))
        ));
        let bad_damping = "[clustering]\nalgorithm = \"affinity_propagation\"\ndamping = 1.5";
        assert!(PipelineConfig::from_toml_str(bad_damping).is_err());
        assert!(matches!(
            PipelineConfig::from_toml_str("matching = 3"),
            Err(VisionError::TomlParse(_))
        ));
    }

    #[test]
    fn color_range_mask_source_is_selectable() -> VisionResult<()> {
        let config = PipelineConfig::from_toml_str(
            r#"
            [mask_source]
            kind = "color_range"
            lower = [81, 0, 0]
            upper = [179, 255, 255]
            iterations = 3
            "#,
        )?;
        assert_eq!(
            config.mask_source,
            MaskSource::ColorRange(ColorRangeMask {
                lower: [81, 0, 0],
                upper: [179, 255, 255],
                iterations: 3,
            })
        );
        assert_eq!(PipelineConfig::default().mask_source, MaskSource::Motion);

        let inverted = "[mask_source]\nkind = \"color_range\"\nlower = [200, 0, 0]\nupper = [100, 0, 0]\niterations = 1";
        assert!(matches!(
            PipelineConfig::from_toml_str(inverted),
            Err(VisionError::Config(_))
        ));
        Ok(())
    }

    #[test]
    fn loads_from_file() -> VisionResult<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "debug_images = true\n[relevance]\nbreakpoint = 40")?;
        let config = PipelineConfig::from_toml_file(file.path())?;
        assert!(config.debug_images);
        assert_eq!(config.relevance.breakpoint, 40);
        Ok(())
    }

    #[test]
    fn arena_preset_filters_small_regions() -> VisionResult<()> {
        let config = PipelineConfig::arena();
        config.validate()?;
        assert_eq!(config.regions.min_area, Some(3000));
        assert_eq!(config.mask.threshold, 50);
        assert_eq!(config.mask.previous_weight, 0.0);
        Ok(())
    }
}
