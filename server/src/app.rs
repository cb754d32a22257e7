use std::sync::Arc;

use crate::config::{AppConfig, EncoderKind};
use crate::services::convert::{CwebpEncoder, Encoder, FormatConverter, LibWebpEncoder};
use crate::services::editor::EditorService;
use crate::services::staging::StagingDir;

/// Application shared state accessible from axum handlers.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Application configuration
    config: AppConfig,
    /// Where uploads are staged and served from
    staging: StagingDir,
    /// Conversion backend
    converter: FormatConverter,
}

impl SharedState {
    /// Build state with the encoder selected by `config`.
    pub fn new(config: AppConfig) -> Self {
        let encoder: Arc<dyn Encoder> = match config.encoder {
            EncoderKind::Cwebp => Arc::new(CwebpEncoder::new(config.cwebp_path.clone())),
            EncoderKind::LibWebp => Arc::new(LibWebpEncoder),
        };
        let staging = StagingDir::new(config.upload_dir.clone(), config.static_url_prefix.clone());
        Self::with_parts(config, staging, encoder)
    }

    /// Build state from explicit parts; tests inject a temp dir and a fake encoder here.
    pub fn with_parts(config: AppConfig, staging: StagingDir, encoder: Arc<dyn Encoder>) -> Self {
        let converter = FormatConverter::new(encoder, config.encoder_timeout);
        Self {
            inner: Arc::new(SharedStateInner {
                config,
                staging,
                converter,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn server_port(&self) -> u16 {
        self.inner.config.server_port
    }

    pub fn staging(&self) -> &StagingDir {
        &self.inner.staging
    }

    pub fn converter(&self) -> &FormatConverter {
        &self.inner.converter
    }

    /// Per-request editor over the shared staging dir and converter.
    pub fn editor(&self) -> EditorService {
        EditorService::new(
            self.inner.staging.clone(),
            self.inner.converter.clone(),
            self.inner.config.default_quality,
        )
        .with_max_pixels(self.inner.config.max_output_pixels)
    }
}
