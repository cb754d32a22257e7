pub mod app;
pub mod config;
pub mod server;
pub mod services;

use config::AppConfig;

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Load config, prepare the staging directory, and build shared state.
pub fn init_foundation() -> Result<app::SharedState, anyhow::Error> {
    load_dotenv();

    let config = AppConfig::load();
    let state = app::SharedState::new(config);

    state.staging().ensure()?;
    tracing::info!(
        upload_dir = %state.staging().root().display(),
        url_prefix = state.staging().url_prefix(),
        encoder = state.converter().encoder_name(),
        "Settings loaded (port={})",
        state.server_port()
    );
    Ok(state)
}
