//! Resize-policy engine for uploaded images.
//!
//! [`geometry`] turns a source size and a [`ResizeMode`] into a
//! [`ResizePlan`] without touching pixels; [`resize`] applies that plan to a
//! decoded image using Lanczos3 resampling.

pub mod geometry;
pub mod resize;

// Re-exports for convenience
pub use geometry::{
    CropBox, DEFAULT_MAX_PIXELS, Dimensions, Preset, ResizeMode, ResizePlan, plan, plan_within,
};
pub use resize::SourceImage;

/// Errors produced while planning or applying a resize.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid source image: {0}")]
    InvalidSource(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
