//! Error types for the vision pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors surfaced by the pipeline and its frame sources.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("dimension mismatch in {operation}: {expected:?} vs {actual:?}")]
    DimensionMismatch {
        operation: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("frame acquisition failed: {0}")]
    Acquisition(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl VisionError {
    /// Create an acquisition failure error.
    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::Acquisition(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check that two buffers share dimensions before a pixel-wise operation.
    pub fn check_dimensions(
        operation: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> VisionResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch {
                operation,
                expected,
                actual,
            })
        }
    }
}
