//! Application configuration backed by `config.toml` and the environment.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::preview::PreviewMode;

/// Directory name used under the platform config and data roots.
pub const APP_DIR: &str = "crystalball";
/// Prefix for environment overrides, e.g. `CRYSTALBALL_API__BASE_URL`.
pub const ENV_PREFIX: &str = "CRYSTALBALL";

/// Default size bound for uploaded CSV files (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the persisted session and log files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Login behaviour.
    #[serde(default)]
    pub auth: AuthConfig,
    /// CSV intake limits and tokenizer choice.
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Settings for the outbound HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base address every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Drop the persisted token when the backend answers 401.
    #[serde(default = "default_true")]
    pub logout_on_unauthorized: bool,
}

/// Settings for [`crate::SessionStore::login`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Fall back to a local demo session when the backend is unreachable.
    #[serde(default = "default_true")]
    pub demo_fallback: bool,
}

/// Settings for [`crate::FilePreviewer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted file, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: u64,
    /// Tokenizer used to build the preview grid.
    #[serde(default)]
    pub preview_mode: PreviewMode,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            logout_on_unauthorized: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            demo_fallback: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
            preview_mode: PreviewMode::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file layered with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from an explicit file path (which may be missing).
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Config::builder()
            .add_source(File::from(path.clone()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config = settings
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration {}", path.display()))?;
        Ok(config)
    }

    /// Path of the durable session file.
    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join("session.json")
    }

    /// Directory receiving log files.
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }
}

/// Default location of `config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Write a default `config.toml` if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let serialized =
        toml::to_string_pretty(&AppConfig::default()).context("failed to serialize config")?;
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write config {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.auth.demo_fallback);
        assert!(config.api.logout_on_unauthorized);
        assert_eq!(config.upload.preview_mode, PreviewMode::Quoted);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
state_dir = "/tmp/crystalball-test"

[api]
base_url = "https://forecast.example.com/api"
request_timeout_secs = 3

[upload]
preview_mode = "compat"
"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api.base_url, "https://forecast.example.com/api");
        assert_eq!(config.api.request_timeout_secs, 3);
        assert_eq!(config.upload.preview_mode, PreviewMode::Compat);
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(
            config.session_path(),
            PathBuf::from("/tmp/crystalball-test/session.json")
        );
        Ok(())
    }

    #[test]
    fn default_config_is_written_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(path.clone())?;
        let written = fs::read_to_string(&path)?;
        assert!(written.contains("base_url"));

        fs::write(&path, "state_dir = \"/custom\"\n")?;
        write_default_config(path.clone())?;
        assert_eq!(fs::read_to_string(&path)?, "state_dir = \"/custom\"\n");
        Ok(())
    }
}
