//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_URL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/[A-Za-z0-9._-]+)+$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "SERVER_HOST" | "UPLOAD_DIR" | "CWEBP_PATH" => {
            if value.trim().is_empty() {
                return Err("must not be empty".into());
            }
        }
        "SERVER_PORT" => validate_int_range(value, 1, 65535)?,
        "STATIC_URL_PREFIX" => {
            if !RE_URL_PREFIX.is_match(value) {
                return Err("must be an absolute path like /static/uploads without trailing slash".into());
            }
        }
        "ENCODER" => {
            if value != "cwebp" && value != "libwebp" {
                return Err("must be 'cwebp' or 'libwebp'".into());
            }
        }
        "ENCODER_TIMEOUT_SECS" => validate_int_range(value, 1, 3600)?,
        "MAX_UPLOAD_BYTES" => validate_int_range(value, 1024, 1024 * 1024 * 1024)?,
        "DEFAULT_QUALITY" => validate_int_range(value, 0, 100)?,
        "MAX_OUTPUT_PIXELS" => validate_int_range(value, 1, 1_000_000_000)?,
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.trim().parse().map_err(|_| "must be an integer")?;
    if !(min..=max).contains(&v) {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}
