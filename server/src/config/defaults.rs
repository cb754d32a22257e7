//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    ("SERVER_HOST", "0.0.0.0", "Address the HTTP server binds to"),
    ("SERVER_PORT", "8000", "Port the HTTP server listens on"),
    ("UPLOAD_DIR", "static/uploads", "Directory holding staged uploads and artifacts"),
    ("STATIC_URL_PREFIX", "/static/uploads", "URL prefix the upload directory is served under"),
    ("ENCODER", "cwebp", "WebP encoder backend: cwebp (subprocess) or libwebp (in-process)"),
    ("CWEBP_PATH", "cwebp", "Path to the cwebp binary"),
    ("ENCODER_TIMEOUT_SECS", "60", "Upper bound for a single conversion"),
    ("MAX_UPLOAD_BYTES", "20971520", "Maximum request body size for uploads"),
    ("DEFAULT_QUALITY", "75", "WebP quality used when the request omits one"),
    ("MAX_OUTPUT_PIXELS", "50000000", "Largest resample target an edit may allocate, in pixels"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}
