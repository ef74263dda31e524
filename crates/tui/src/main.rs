mod app;
mod orb;

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};

use crystalball_core::{
    config::{self, AppConfig},
    FilePreviewer, HttpClient, PredictionStore, SessionStore, TokenStore,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config)?;

    let tokens = TokenStore::new(config.session_path());
    let client = HttpClient::new(&config.api, tokens).context("failed to build HTTP client")?;
    let session = SessionStore::new(client.clone(), config.auth.demo_fallback);
    let restored = session.restore();
    info!(
        base_url = client.base_url(),
        authenticated = restored.is_authenticated(),
        "starting crystal ball"
    );
    let predictions = PredictionStore::new();
    let previewer = FilePreviewer::new(config.upload.max_bytes, config.upload.preview_mode);

    let mut app = app::CrystalBallApp::new(config, client, session, predictions, previewer);
    app.run().await
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("crystalball.log");
    // Fail here rather than inside the writer closure.
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
