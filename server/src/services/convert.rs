//! WebP conversion behind a swappable [`Encoder`] capability.
//!
//! [`FormatConverter`] owns the lifecycle around an encoder run: quality
//! clamping, the timeout, reading back the produced dimensions, and removing
//! the staged input and any partial output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use image::ImageReader;
use image_engine::Dimensions;
use tokio::process::Command;

use super::staging::StagedFile;

/// Quality used when a request does not specify one.
pub const DEFAULT_QUALITY: u8 = 75;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Conversion failed: {0}")]
    Failed(String),
    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Clamp an arbitrary requested quality into `0..=100`.
pub fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(0, 100) as u8
}

/// One encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: u8,
}

impl ConversionRequest {
    /// Out-of-range qualities are clamped, never rejected.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, quality: i64) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            quality: clamp_quality(quality),
        }
    }
}

/// Something that can turn `request.input` into a WebP file at `request.output`.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert<'a>(&'a self, request: &'a ConversionRequest) -> BoxFuture<'a, Result<(), ConvertError>>;
}

/// Runs the `cwebp` command line encoder.
#[derive(Debug, Clone)]
pub struct CwebpEncoder {
    binary: PathBuf,
}

impl CwebpEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Encoder for CwebpEncoder {
    fn name(&self) -> &'static str {
        "cwebp"
    }

    fn convert<'a>(&'a self, request: &'a ConversionRequest) -> BoxFuture<'a, Result<(), ConvertError>> {
        Box::pin(async move {
            // kill_on_drop: a timed out conversion must not leave the child behind.
            let output = Command::new(&self.binary)
                .arg("-q")
                .arg(request.quality.to_string())
                .arg(&request.input)
                .arg("-o")
                .arg(&request.output)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| {
                    ConvertError::Failed(format!("failed to run {}: {e}", self.binary.display()))
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                let detail = if stderr.is_empty() {
                    format!("cwebp exited with {}", output.status)
                } else {
                    stderr.to_string()
                };
                return Err(ConvertError::Failed(detail));
            }

            Ok(())
        })
    }
}

/// Encodes in-process with libwebp.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibWebpEncoder;

impl LibWebpEncoder {
    fn encode(input: &Path, quality: u8) -> Result<Vec<u8>, ConvertError> {
        let img = ImageReader::open(input)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| ConvertError::Failed(format!("cannot decode input: {e}")))?;

        let (width, height) = (img.width(), img.height());
        let quality = f32::from(quality);
        let encoded = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            webp::Encoder::from_rgba(&rgba, width, height).encode_simple(false, quality)
        } else {
            let rgb = img.to_rgb8();
            webp::Encoder::from_rgb(&rgb, width, height).encode_simple(false, quality)
        }
        .map_err(|e| ConvertError::Failed(format!("libwebp encode error: {e:?}")))?;

        Ok(encoded.to_vec())
    }
}

impl Encoder for LibWebpEncoder {
    fn name(&self) -> &'static str {
        "libwebp"
    }

    fn convert<'a>(&'a self, request: &'a ConversionRequest) -> BoxFuture<'a, Result<(), ConvertError>> {
        let input = request.input.clone();
        let quality = request.quality;
        Box::pin(async move {
            let encoded = tokio::task::spawn_blocking(move || Self::encode(&input, quality))
                .await
                .map_err(|e| ConvertError::Failed(format!("encoder task failed: {e}")))??;
            // Written here rather than on the blocking thread so a timed out
            // conversion never produces a file.
            tokio::fs::write(&request.output, encoded).await?;
            Ok(())
        })
    }
}

/// A finished conversion.
#[derive(Debug, Clone)]
pub struct Converted {
    pub output: PathBuf,
    pub dimensions: Dimensions,
}

/// Drives an [`Encoder`] and cleans up after it.
#[derive(Clone)]
pub struct FormatConverter {
    encoder: Arc<dyn Encoder>,
    timeout: Duration,
}

impl FormatConverter {
    pub fn new(encoder: Arc<dyn Encoder>, timeout: Duration) -> Self {
        Self { encoder, timeout }
    }

    pub fn encoder_name(&self) -> &'static str {
        self.encoder.name()
    }

    /// Convert `input` into `output`.
    ///
    /// Consumes both guards: the input is always removed, the output is kept
    /// only when the encoder succeeded and the result decodes.
    pub async fn convert(
        &self,
        input: StagedFile,
        output: StagedFile,
        quality: i64,
    ) -> Result<Converted, ConvertError> {
        let request = ConversionRequest::new(input.path(), output.path(), quality);
        tracing::debug!(
            encoder = self.encoder.name(),
            input = %request.input.display(),
            quality = request.quality,
            "Starting conversion"
        );

        match tokio::time::timeout(self.timeout, self.encoder.convert(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(ConvertError::Timeout(self.timeout)),
        }

        let path = request.output.clone();
        let dimensions = tokio::task::spawn_blocking(move || read_dimensions(&path))
            .await
            .map_err(|e| ConvertError::Failed(format!("dimension probe failed: {e}")))??;

        input.discard().await;
        let output = output.keep();
        tracing::info!(
            output = %output.display(),
            width = dimensions.width(),
            height = dimensions.height(),
            quality = request.quality,
            "Conversion finished"
        );
        Ok(Converted { output, dimensions })
    }
}

fn read_dimensions(path: &Path) -> Result<Dimensions, ConvertError> {
    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| ConvertError::Failed(format!("produced file is unreadable: {e}")))?;
    Dimensions::new(width, height)
        .ok_or_else(|| ConvertError::Failed(format!("produced image has size {width}x{height}")))
}
