//! Upload orchestration: stage, optionally resize, optionally convert, respond.

use std::io::{BufWriter, Write};
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};
use image_engine::{DEFAULT_MAX_PIXELS, Dimensions, EngineError, ResizeMode, SourceImage};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::convert::{ConvertError, FormatConverter};
use super::staging::{StagedFile, StagingDir, split_filename};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Invalid source image: {0}")]
    InvalidSource(String),
    #[error("{0}")]
    ConversionFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for EditorError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidParameters(msg) => EditorError::InvalidParameters(msg),
            EngineError::InvalidSource(msg) => EditorError::InvalidSource(msg),
        }
    }
}

impl From<ConvertError> for EditorError {
    fn from(e: ConvertError) -> Self {
        match e {
            ConvertError::Io(io) => EditorError::Io(io),
            other => EditorError::ConversionFailed(other.to_string()),
        }
    }
}

impl From<image::ImageError> for EditorError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => EditorError::Io(io),
            other => EditorError::InvalidSource(other.to_string()),
        }
    }
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Raw resize fields from the edit form. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct EditParams {
    pub resize_mode: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub percentage: Option<String>,
    pub preset: Option<String>,
}

impl EditParams {
    /// `Ok(None)` means no resize was requested.
    pub fn resize_mode(&self) -> Result<Option<ResizeMode>, EditorError> {
        let Some(kind) = non_empty(&self.resize_mode) else {
            return Ok(None);
        };
        let mode = ResizeMode::from_parts(
            kind,
            parse_field("width", &self.width)?,
            parse_field("height", &self.height)?,
            parse_field("percentage", &self.percentage)?,
            non_empty(&self.preset),
        )?;
        Ok(Some(mode))
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_field(name: &str, field: &Option<String>) -> Result<Option<u32>, EditorError> {
    non_empty(field)
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                EditorError::InvalidParameters(format!("{name} must be a non-negative integer, got {v:?}"))
            })
        })
        .transpose()
}

/// Where the produced artifact can be fetched; serialized under a
/// route-specific key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ArtifactPath {
    #[serde(rename = "image_path")]
    Image(String),
    #[serde(rename = "webp_path")]
    Webp(String),
}

/// Uniform response body for edit and convert requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub path: Option<ArtifactPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>, path: ArtifactPath, dimensions: Dimensions) -> Self {
        Self {
            success: true,
            message: message.into(),
            path: Some(path),
            width: Some(dimensions.width()),
            height: Some(dimensions.height()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path: None,
            width: None,
            height: None,
        }
    }
}

#[derive(Clone)]
pub struct EditorService {
    staging: StagingDir,
    converter: FormatConverter,
    default_quality: u8,
    max_pixels: u64,
}

impl EditorService {
    pub fn new(staging: StagingDir, converter: FormatConverter, default_quality: u8) -> Self {
        Self {
            staging,
            converter,
            default_quality,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    /// Cap on the pixels a single resize may allocate.
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Stage the upload and optionally resize it in place.
    pub async fn edit(&self, upload: Upload, params: &EditParams) -> OperationResult {
        let filename = upload.filename.clone();
        match self.try_edit(upload, params).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(filename = %filename, error = %e, "Edit failed");
                OperationResult::failure(e.to_string())
            }
        }
    }

    /// Stage the upload and convert it to WebP.
    ///
    /// `quality` is the raw form value; absent means the configured default.
    pub async fn convert(&self, upload: Upload, quality: Option<&str>) -> OperationResult {
        let filename = upload.filename.clone();
        match self.try_convert(upload, quality).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(filename = %filename, error = %e, "Conversion failed");
                OperationResult::failure(e.to_string())
            }
        }
    }

    async fn try_edit(&self, upload: Upload, params: &EditParams) -> Result<OperationResult, EditorError> {
        // Validate before anything touches the disk.
        let mode = params.resize_mode()?;

        let staged = self.staging.stage(&upload.filename, &upload.data).await?;
        let path = staged.path().to_path_buf();
        let max_pixels = self.max_pixels;
        let (dimensions, format) =
            tokio::task::spawn_blocking(move || rewrite_in_place(&path, mode.as_ref(), max_pixels))
                .await
                .map_err(|e| std::io::Error::other(format!("edit task failed: {e}")))??;

        let path = self
            .with_format_extension(staged, &upload.filename, format)
            .await?
            .keep();
        tracing::info!(
            path = %path.display(),
            ?mode,
            width = dimensions.width(),
            height = dimensions.height(),
            "Image edited"
        );

        let message = if mode.is_some() {
            "Image resized successfully"
        } else {
            "Image uploaded successfully"
        };
        Ok(OperationResult::success(
            message,
            ArtifactPath::Image(self.staging.url_for(&path)),
            dimensions,
        ))
    }

    /// Rename `staged` when its extension does not match the decoded format,
    /// so the artifact is served with the right content type.
    async fn with_format_extension(
        &self,
        staged: StagedFile,
        filename: &str,
        format: ImageFormat,
    ) -> Result<StagedFile, EditorError> {
        let extensions = format.extensions_str();
        let (stem, ext) = split_filename(filename);
        let canonical = match (ext, extensions.first()) {
            (Some(ext), _) if extensions.contains(&ext.as_str()) => return Ok(staged),
            (_, None) => return Ok(staged),
            (_, Some(canonical)) => *canonical,
        };

        let renamed = self.staging.reserve(&stem, Some(canonical));
        tokio::fs::rename(staged.path(), renamed.path()).await?;
        let from = staged.keep();
        tracing::debug!(
            from = %from.display(),
            to = %renamed.path().display(),
            "Renamed artifact to match its format"
        );
        Ok(renamed)
    }

    async fn try_convert(&self, upload: Upload, quality: Option<&str>) -> Result<OperationResult, EditorError> {
        let quality = match quality.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => q.parse::<i64>().map_err(|_| {
                EditorError::InvalidParameters(format!("quality must be an integer, got {q:?}"))
            })?,
            None => i64::from(self.default_quality),
        };

        let (stem, _) = split_filename(&upload.filename);
        let input = self.staging.stage(&upload.filename, &upload.data).await?;
        let output = self.staging.reserve(&stem, Some("webp"));

        let converted = self.converter.convert(input, output, quality).await?;

        Ok(OperationResult::success(
            "Image converted successfully",
            ArtifactPath::Webp(self.staging.url_for(&converted.output)),
            converted.dimensions,
        ))
    }
}

/// Decode `path`, apply `mode`, and atomically replace the file with the
/// result encoded in its original format. Returns the final dimensions and
/// the format detected from the content.
fn rewrite_in_place(
    path: &Path,
    mode: Option<&ResizeMode>,
    max_pixels: u64,
) -> Result<(Dimensions, ImageFormat), EditorError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| EditorError::InvalidSource("unrecognized image format".into()))?;
    let source = SourceImage::new(reader.decode()?)?;

    let Some(mode) = mode else {
        return Ok((source.dimensions(), format));
    };

    let resized = source.resize_within(mode, max_pixels)?;
    let dimensions = resized.dimensions();
    let image = encodable(resized.into_image(), format);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        image.write_to(&mut writer, format)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok((dimensions, format))
}

/// Convert to a pixel layout the target encoder accepts.
fn encodable(image: DynamicImage, format: ImageFormat) -> DynamicImage {
    match (format, image) {
        (ImageFormat::Jpeg, img @ (DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_))) => img,
        (ImageFormat::Jpeg, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
        (ImageFormat::Gif, img @ (DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_))) => img,
        (ImageFormat::Gif, img) => DynamicImage::ImageRgba8(img.to_rgba8()),
        (_, img) => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::convert::tests::{CopyEncoder, FailingEncoder, png_bytes};
    use std::sync::Arc;
    use std::time::Duration;

    fn service(root: &Path, converter: FormatConverter) -> EditorService {
        EditorService::new(StagingDir::new(root, "/static/uploads"), converter, 75)
    }

    fn copy_converter() -> FormatConverter {
        FormatConverter::new(Arc::new(CopyEncoder::default()), Duration::from_secs(5))
    }

    fn upload(name: &str, data: Vec<u8>) -> Upload {
        Upload {
            filename: name.to_string(),
            data,
        }
    }

    fn params(mode: &str, pairs: &[(&str, &str)]) -> EditParams {
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        };
        EditParams {
            resize_mode: Some(mode.to_string()),
            width: get("width"),
            height: get("height"),
            percentage: get("percentage"),
            preset: get("preset"),
        }
    }

    fn only_file(dir: &Path) -> std::path::PathBuf {
        let entries: Vec<_> = std::fs::read_dir(dir).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1, "expected exactly one artifact");
        entries[0].path()
    }

    #[test]
    fn empty_params_mean_no_resize() {
        assert_eq!(EditParams::default().resize_mode().unwrap(), None);
        let blank = EditParams {
            resize_mode: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(blank.resize_mode().unwrap(), None);
    }

    #[test]
    fn non_numeric_width_is_invalid() {
        let p = params("exact", &[("width", "wide"), ("height", "10")]);
        assert!(matches!(p.resize_mode(), Err(EditorError::InvalidParameters(_))));
        let p = params("exact", &[("width", "-3"), ("height", "10")]);
        assert!(matches!(p.resize_mode(), Err(EditorError::InvalidParameters(_))));
    }

    #[test]
    fn operation_result_json_shape() {
        let ok = OperationResult::success(
            "done",
            ArtifactPath::Webp("/static/uploads/a.webp".into()),
            Dimensions::new(3, 4).unwrap(),
        );
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({
                "success": true,
                "message": "done",
                "webp_path": "/static/uploads/a.webp",
                "width": 3,
                "height": 4,
            })
        );

        let failed = OperationResult::failure("boom");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "success": false, "message": "boom" })
        );
    }

    #[tokio::test]
    async fn edit_without_mode_keeps_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let result = svc.edit(upload("photo.png", png_bytes(40, 20)), &EditParams::default()).await;

        assert!(result.success, "{}", result.message);
        assert_eq!((result.width, result.height), (Some(40), Some(20)));
        let file = only_file(tmp.path());
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(result.path, Some(ArtifactPath::Image(format!("/static/uploads/{name}"))));
    }

    #[tokio::test]
    async fn edit_fit_rewrites_file_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let p = params("fit", &[("width", "300"), ("height", "300")]);
        let result = svc.edit(upload("wide.png", png_bytes(1000, 500)), &p).await;

        assert!(result.success, "{}", result.message);
        assert_eq!((result.width, result.height), (Some(300), Some(150)));
        let on_disk = image::open(only_file(tmp.path())).unwrap();
        assert_eq!((on_disk.width(), on_disk.height()), (300, 150));
    }

    #[tokio::test]
    async fn edit_fill_and_preset() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let fill = params("fill", &[("width", "80"), ("height", "80")]);
        let result = svc.edit(upload("a.png", png_bytes(400, 200)), &fill).await;
        assert_eq!((result.width, result.height), (Some(80), Some(80)));

        let preset = params("preset", &[("preset", "THUMBNAIL")]);
        let result = svc.edit(upload("b.png", png_bytes(30, 60)), &preset).await;
        assert_eq!((result.width, result.height), (Some(150), Some(150)));
    }

    #[tokio::test]
    async fn edit_jpeg_keeps_format() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let img = DynamicImage::ImageRgb8(image::RgbImage::new(64, 64));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();

        let p = params("percentage", &[("percentage", "50")]);
        let result = svc.edit(upload("shot.jpg", buf.into_inner()), &p).await;

        assert!(result.success, "{}", result.message);
        let data = std::fs::read(only_file(tmp.path())).unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn missing_height_fails_without_touching_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let p = params("exact", &[("width", "100")]);
        let result = svc.edit(upload("photo.png", png_bytes(10, 10)), &p).await;

        assert!(!result.success);
        assert!(result.message.starts_with("Invalid parameters"), "{}", result.message);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn non_image_upload_is_cleaned_up() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let p = params("percentage", &[("percentage", "50")]);
        let result = svc.edit(upload("notes.png", b"hello".to_vec()), &p).await;

        assert!(!result.success);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn degenerate_percentage_is_cleaned_up() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let p = params("percentage", &[("percentage", "1")]);
        let result = svc.edit(upload("tiny.png", png_bytes(20, 20)), &p).await;

        assert!(!result.success);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn oversized_resize_targets_fail_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let huge = params("exact", &[("width", "100000"), ("height", "100000")]);
        let result = svc.edit(upload("small.png", png_bytes(10, 10)), &huge).await;
        assert!(!result.success);
        assert!(result.message.starts_with("Invalid parameters"), "{}", result.message);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

        let cover = params("fill", &[("width", "2000"), ("height", "2000")]);
        let result = svc.edit(upload("strip.png", png_bytes(20000, 1)), &cover).await;
        assert!(!result.success);
        assert!(result.message.starts_with("Invalid parameters"), "{}", result.message);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn configured_pixel_limit_applies() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter()).with_max_pixels(399);

        let p = params("exact", &[("width", "20"), ("height", "20")]);
        let result = svc.edit(upload("a.png", png_bytes(4, 4)), &p).await;

        assert!(!result.success);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn edited_artifact_extension_follows_content() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let img = DynamicImage::ImageRgb8(image::RgbImage::new(32, 32));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();

        let p = params("percentage", &[("percentage", "50")]);
        let result = svc.edit(upload("x.png", buf.into_inner()), &p).await;

        assert!(result.success, "{}", result.message);
        assert!(matches!(result.path, Some(ArtifactPath::Image(ref p)) if p.ends_with("_x.jpg")));
        let file = only_file(tmp.path());
        assert_eq!(file.extension().unwrap(), "jpg");
        let data = std::fs::read(&file).unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn unresized_upload_is_renamed_to_its_format() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let result = svc.edit(upload("x.txt", png_bytes(5, 5)), &EditParams::default()).await;

        assert!(result.success, "{}", result.message);
        assert!(matches!(result.path, Some(ArtifactPath::Image(ref p)) if p.ends_with("_x.png")));
        assert_eq!(only_file(tmp.path()).extension().unwrap(), "png");
    }

    #[tokio::test]
    async fn matching_extension_variant_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let img = DynamicImage::ImageRgb8(image::RgbImage::new(8, 8));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();

        let result = svc.edit(upload("shot.JPEG", buf.into_inner()), &EditParams::default()).await;

        assert!(result.success, "{}", result.message);
        assert_eq!(only_file(tmp.path()).extension().unwrap(), "jpeg");
    }

    #[tokio::test]
    async fn convert_clamps_quality_and_reports_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CopyEncoder::default());
        let converter = FormatConverter::new(encoder.clone(), Duration::from_secs(5));
        let svc = service(tmp.path(), converter);

        let result = svc.convert(upload("pic.png", png_bytes(12, 7)), Some("150")).await;

        assert!(result.success, "{}", result.message);
        assert_eq!((result.width, result.height), (Some(12), Some(7)));
        let file = only_file(tmp.path());
        assert_eq!(file.extension().unwrap(), "webp");
        assert!(matches!(result.path, Some(ArtifactPath::Webp(ref p)) if p.ends_with("_pic.webp")));
        assert_eq!(*encoder.qualities.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn convert_uses_default_quality() {
        let tmp = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CopyEncoder::default());
        let converter = FormatConverter::new(encoder.clone(), Duration::from_secs(5));
        let svc = service(tmp.path(), converter);

        let result = svc.convert(upload("pic.png", png_bytes(2, 2)), None).await;

        assert!(result.success);
        assert_eq!(*encoder.qualities.lock().unwrap(), vec![75]);
    }

    #[tokio::test]
    async fn convert_rejects_non_numeric_quality() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), copy_converter());

        let result = svc.convert(upload("pic.png", png_bytes(2, 2)), Some("high")).await;

        assert!(!result.success);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn convert_failure_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let converter = FormatConverter::new(Arc::new(FailingEncoder), Duration::from_secs(5));
        let svc = service(tmp.path(), converter);

        let result = svc.convert(upload("pic.png", png_bytes(2, 2)), Some("80")).await;

        assert!(!result.success);
        assert!(result.message.contains("unsupported input"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
