//! HTTP server binary for the WebP image editor.

use tracing_subscriber::EnvFilter;

use webp_editor_lib::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting WebP image editor");

    let state = webp_editor_lib::init_foundation()?;
    server::start_server(state).await?;

    tracing::info!("Server stopped");
    Ok(())
}
