//! Applies resize plans to decoded images.
//!
//! Resampling always uses Lanczos3. Fill plans resample to the cover size
//! first and crop afterwards.

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::debug;

use crate::geometry::{self, Dimensions, ResizeMode, ResizePlan};
use crate::{EngineError, Result};

/// A decoded image together with its (non-zero) dimensions.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    dimensions: Dimensions,
}

impl SourceImage {
    /// Wrap a decoded image. Zero-sized buffers are rejected as `InvalidSource`.
    pub fn new(image: DynamicImage) -> Result<Self> {
        let dimensions = Dimensions::new(image.width(), image.height()).ok_or_else(|| {
            EngineError::InvalidSource(format!(
                "decoded image has degenerate size {}x{}",
                image.width(),
                image.height()
            ))
        })?;
        Ok(Self { image, dimensions })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Plan and apply `mode`, returning a new image.
    pub fn resize(&self, mode: &ResizeMode) -> Result<SourceImage> {
        self.resize_within(mode, geometry::DEFAULT_MAX_PIXELS)
    }

    /// Like [`SourceImage::resize`], rejecting plans whose resample target
    /// exceeds `max_pixels` before any buffer is allocated.
    pub fn resize_within(&self, mode: &ResizeMode, max_pixels: u64) -> Result<SourceImage> {
        let source = (self.dimensions.width(), self.dimensions.height());
        let plan = geometry::plan_within(source, mode, max_pixels)?;
        Ok(self.apply(&plan))
    }

    /// Apply an already computed plan.
    pub fn apply(&self, plan: &ResizePlan) -> SourceImage {
        let scaled = resample(&self.image, plan.scaled);

        let image = match plan.crop {
            Some(crop) => {
                debug!(
                    left = crop.left,
                    top = crop.top,
                    width = crop.width(),
                    height = crop.height(),
                    "Cropping resized image"
                );
                scaled.crop_imm(crop.left, crop.top, crop.width(), crop.height())
            }
            None => scaled,
        };

        SourceImage {
            image,
            dimensions: plan.output(),
        }
    }
}

/// Resample to exactly `target`, skipping the work when sizes already match.
fn resample(img: &DynamicImage, target: Dimensions) -> DynamicImage {
    let (orig_w, orig_h) = (img.width(), img.height());

    if orig_w == target.width() && orig_h == target.height() {
        debug!(orig_w, orig_h, "Image already at target size, skipping resample");
        return img.clone();
    }

    debug!(
        orig_w,
        orig_h,
        new_width = target.width(),
        new_height = target.height(),
        "Resampling image"
    );

    img.resize_exact(target.width(), target.height(), FilterType::Lanczos3)
}
