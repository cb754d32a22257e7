//! Pure dimension calculations for every resize mode.
//!
//! Nothing here touches pixels or files. All arithmetic is done on integers
//! (widened to `u64`) so the same input always yields the same plan.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::{EngineError, Result};

/// Upper bound for `ResizeMode::Percentage`.
pub const MAX_PERCENTAGE: u32 = 200;

/// Pixel ceiling used by [`plan`] for the largest buffer a resize allocates.
pub const DEFAULT_MAX_PIXELS: u64 = 50_000_000;

/// Width and height of an image in pixels. Both are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    /// Returns `None` when either side is zero.
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn from_wide(width: u64, height: u64) -> Result<Self> {
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(EngineError::InvalidParameters(format!(
                "resulting size {width}x{height} is too large"
            )));
        };
        Self::new(w, h).ok_or_else(|| {
            EngineError::InvalidParameters(format!(
                "resulting size {width}x{height} is degenerate"
            ))
        })
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named target sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Hd,
    FullHd,
    Qhd,
    Instagram,
    Twitter,
    Facebook,
    Thumbnail,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Hd,
        Preset::FullHd,
        Preset::Qhd,
        Preset::Instagram,
        Preset::Twitter,
        Preset::Facebook,
        Preset::Thumbnail,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Preset::Hd => "HD",
            Preset::FullHd => "FULL_HD",
            Preset::Qhd => "QHD",
            Preset::Instagram => "INSTAGRAM",
            Preset::Twitter => "TWITTER",
            Preset::Facebook => "FACEBOOK",
            Preset::Thumbnail => "THUMBNAIL",
        }
    }

    pub const fn dimensions(self) -> Dimensions {
        let (width, height) = match self {
            Preset::Hd => (1280, 720),
            Preset::FullHd => (1920, 1080),
            Preset::Qhd => (2560, 1440),
            Preset::Instagram => (1080, 1080),
            Preset::Twitter => (1200, 675),
            Preset::Facebook => (1200, 630),
            Preset::Thumbnail => (150, 150),
        };
        Dimensions { width, height }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = EngineError;

    /// Case-insensitive; `-` and `_` are interchangeable and optional.
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();
        Preset::ALL
            .into_iter()
            .find(|p| p.name().replace('_', "") == key)
            .ok_or_else(|| EngineError::InvalidParameters(format!("unknown preset: {s}")))
    }
}

/// How an image should be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Stretch to exactly this size; aspect ratio is not kept.
    Exact { width: u32, height: u32 },
    /// Scale both axes by `factor / 100`, `factor` in `1..=200`.
    Percentage(u32),
    Preset(Preset),
    /// Largest aspect-preserving size contained in the box.
    Fit { width: u32, height: u32 },
    /// Cover the box, then crop the overflow around the center.
    Fill { width: u32, height: u32 },
}

impl ResizeMode {
    /// Builds a mode from loosely typed request fields.
    ///
    /// `kind` is one of `exact`, `percentage`, `preset`, `fit`, `fill`
    /// (case-insensitive). Only the fields the chosen mode needs are
    /// inspected; a missing one is an `InvalidParameters` error.
    pub fn from_parts(
        kind: &str,
        width: Option<u32>,
        height: Option<u32>,
        percentage: Option<u32>,
        preset: Option<&str>,
    ) -> Result<Self> {
        let boxed = |mode: &str| -> Result<(u32, u32)> {
            match (width, height) {
                (Some(w), Some(h)) => Ok((w, h)),
                _ => Err(EngineError::InvalidParameters(format!(
                    "width and height are required for {mode} mode"
                ))),
            }
        };

        match kind.trim().to_ascii_lowercase().as_str() {
            "exact" => {
                let (width, height) = boxed("exact")?;
                Ok(ResizeMode::Exact { width, height })
            }
            "fit" => {
                let (width, height) = boxed("fit")?;
                Ok(ResizeMode::Fit { width, height })
            }
            "fill" => {
                let (width, height) = boxed("fill")?;
                Ok(ResizeMode::Fill { width, height })
            }
            "percentage" => percentage.map(ResizeMode::Percentage).ok_or_else(|| {
                EngineError::InvalidParameters(
                    "percentage is required for percentage mode".into(),
                )
            }),
            "preset" => {
                let name = preset.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
                    EngineError::InvalidParameters("preset is required for preset mode".into())
                })?;
                Ok(ResizeMode::Preset(name.parse()?))
            }
            other => Err(EngineError::InvalidParameters(format!(
                "unknown resize mode: {other}"
            ))),
        }
    }
}

/// Sub-rectangle of a resized buffer, as half-open pixel offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// True when the box is non-empty and lies inside `buffer`.
    pub fn fits_within(&self, buffer: Dimensions) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && self.right <= buffer.width
            && self.bottom <= buffer.height
    }
}

/// Result of planning a resize: resample to `scaled`, then optionally crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub scaled: Dimensions,
    pub crop: Option<CropBox>,
}

impl ResizePlan {
    /// Dimensions of the final image after the optional crop.
    pub fn output(&self) -> Dimensions {
        match self.crop {
            Some(crop) => Dimensions {
                width: crop.width(),
                height: crop.height(),
            },
            None => self.scaled,
        }
    }
}

/// Compute the resize plan for an image of size `source` under
/// [`DEFAULT_MAX_PIXELS`].
pub fn plan(source: (u32, u32), mode: &ResizeMode) -> Result<ResizePlan> {
    plan_within(source, mode, DEFAULT_MAX_PIXELS)
}

/// Compute the resize plan for an image of size `source`.
///
/// `source` is taken as a raw pair so that degenerate decodes are reported as
/// `InvalidSource` instead of being impossible to express.
///
/// `max_pixels` caps the resample target. For Fill that is the cover
/// intermediate, which is never smaller than the final output.
pub fn plan_within(source: (u32, u32), mode: &ResizeMode, max_pixels: u64) -> Result<ResizePlan> {
    let original = Dimensions::new(source.0, source.1).ok_or_else(|| {
        EngineError::InvalidSource(format!(
            "source image has degenerate size {}x{}",
            source.0, source.1
        ))
    })?;

    let plan = match *mode {
        ResizeMode::Exact { width, height } => ResizePlan {
            scaled: target_box("exact", width, height)?,
            crop: None,
        },
        ResizeMode::Percentage(factor) => ResizePlan {
            scaled: percentage(original, factor)?,
            crop: None,
        },
        ResizeMode::Preset(preset) => ResizePlan {
            scaled: preset.dimensions(),
            crop: None,
        },
        ResizeMode::Fit { width, height } => ResizePlan {
            scaled: fit(original, target_box("fit", width, height)?),
            crop: None,
        },
        ResizeMode::Fill { width, height } => fill(original, target_box("fill", width, height)?)?,
    };

    if plan.scaled.pixels() > max_pixels {
        return Err(EngineError::InvalidParameters(format!(
            "resize to {} needs {} pixels, limit is {max_pixels}",
            plan.scaled,
            plan.scaled.pixels()
        )));
    }

    debug!(
        original = %original,
        scaled = %plan.scaled,
        output = %plan.output(),
        ?mode,
        "Planned resize"
    );
    Ok(plan)
}

fn target_box(mode: &str, width: u32, height: u32) -> Result<Dimensions> {
    Dimensions::new(width, height).ok_or_else(|| {
        EngineError::InvalidParameters(format!(
            "{mode} mode needs positive width and height, got {width}x{height}"
        ))
    })
}

fn percentage(original: Dimensions, factor: u32) -> Result<Dimensions> {
    if !(1..=MAX_PERCENTAGE).contains(&factor) {
        return Err(EngineError::InvalidParameters(format!(
            "percentage must be between 1 and {MAX_PERCENTAGE}, got {factor}"
        )));
    }
    let f = u64::from(factor);
    Dimensions::from_wide(
        u64::from(original.width) * f / 100,
        u64::from(original.height) * f / 100,
    )
}

/// Contain: the bounding axis hits the box exactly, the other is floored.
/// Both growing and shrinking are allowed.
fn fit(original: Dimensions, bounds: Dimensions) -> Dimensions {
    let (ow, oh) = (u64::from(original.width), u64::from(original.height));
    let (bw, bh) = (u64::from(bounds.width), u64::from(bounds.height));

    // bw/ow <= bh/oh  <=>  bw*oh <= bh*ow
    let (w, h) = if bw * oh <= bh * ow {
        (bw, oh * bw / ow)
    } else {
        (ow * bh / oh, bh)
    };

    // Results never exceed the box, so the narrowing casts are lossless.
    Dimensions {
        width: (w as u32).max(1),
        height: (h as u32).max(1),
    }
}

/// Cover: the tighter axis hits the box exactly and the other overflows,
/// then a centered crop trims the overflow. Odd overflow biases top-left.
fn fill(original: Dimensions, target: Dimensions) -> Result<ResizePlan> {
    let (ow, oh) = (u64::from(original.width), u64::from(original.height));
    let (tw, th) = (u64::from(target.width), u64::from(target.height));

    // ow/oh > tw/th  <=>  ow*th > tw*oh
    let scaled = if ow * th > tw * oh {
        Dimensions::from_wide(ow * th / oh, th)?
    } else {
        Dimensions::from_wide(tw, oh * tw / ow)?
    };

    let left = (scaled.width - target.width) / 2;
    let top = (scaled.height - target.height) / 2;
    let crop = CropBox {
        left,
        top,
        right: left + target.width,
        bottom: top + target.height,
    };

    Ok(ResizePlan {
        scaled,
        crop: Some(crop),
    })
}
