//! Runtime application configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use image_engine::DEFAULT_MAX_PIXELS;

use crate::services::convert::DEFAULT_QUALITY;

use super::defaults::get_default;
use super::validation::validate_setting;

/// Which WebP encoder backend performs conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    /// External `cwebp` process.
    Cwebp,
    /// In-process libwebp via the `webp` crate.
    LibWebp,
}

/// Runtime configuration populated from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub upload_dir: PathBuf,
    pub static_url_prefix: String,
    pub encoder: EncoderKind,
    pub cwebp_path: PathBuf,
    pub encoder_timeout: Duration,
    pub max_upload_bytes: usize,
    pub default_quality: u8,
    pub max_output_pixels: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::load_from(|_| None)
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup.
    ///
    /// Missing keys use their default. Present but invalid values are logged
    /// and replaced by the default as well.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let g = |key: &str| -> String {
            let fallback = get_default(key).unwrap_or_default();
            match lookup(key) {
                Some(value) => match validate_setting(key, &value) {
                    Ok(()) => value.trim().to_string(),
                    Err(reason) => {
                        tracing::warn!(key, value = %value, reason = %reason, "Invalid setting, using default");
                        fallback.to_string()
                    }
                },
                None => fallback.to_string(),
            }
        };

        Self {
            server_host: g("SERVER_HOST"),
            server_port: parse_num(&g("SERVER_PORT"), 8000),
            upload_dir: PathBuf::from(g("UPLOAD_DIR")),
            static_url_prefix: g("STATIC_URL_PREFIX"),
            encoder: match g("ENCODER").as_str() {
                "libwebp" => EncoderKind::LibWebp,
                _ => EncoderKind::Cwebp,
            },
            cwebp_path: PathBuf::from(g("CWEBP_PATH")),
            encoder_timeout: Duration::from_secs(parse_num(&g("ENCODER_TIMEOUT_SECS"), 60)),
            max_upload_bytes: parse_num(&g("MAX_UPLOAD_BYTES"), 20 * 1024 * 1024),
            default_quality: parse_num(&g("DEFAULT_QUALITY"), DEFAULT_QUALITY),
            max_output_pixels: parse_num(&g("MAX_OUTPUT_PIXELS"), DEFAULT_MAX_PIXELS),
        }
    }

    /// `host:port` pair for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_num<T: std::str::FromStr>(s: &str, default: T) -> T {
    s.parse().unwrap_or(default)
}
