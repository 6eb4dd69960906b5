mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./vidserve.toml",
        "~/.config/vidserve/config.toml",
        "/etc/vidserve/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Apply environment overrides from the process environment
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Recognised variables: `MINIO_ENDPOINT`, `MINIO_ACCESS_KEY`,
/// `MINIO_SECRET_KEY`, `VIDSERVE_DATABASE`. An endpoint without a scheme is
/// treated as plain HTTP.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(endpoint) = lookup("MINIO_ENDPOINT").filter(|v| !v.is_empty()) {
        let endpoint = if endpoint.contains("://") {
            endpoint
        } else {
            format!("http://{}", endpoint)
        };
        config.storage.endpoint = Some(endpoint);
    }

    if let Some(key) = lookup("MINIO_ACCESS_KEY") {
        config.storage.access_key = Some(key);
    }

    if let Some(secret) = lookup("MINIO_SECRET_KEY") {
        config.storage.secret_key = Some(secret);
    }

    if let Some(path) = lookup("VIDSERVE_DATABASE").filter(|v| !v.is_empty()) {
        config.database.path = PathBuf::from(path);
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.streaming.chunk_size == 0 {
        anyhow::bail!("streaming.chunk_size must be greater than 0");
    }

    match config.storage.backend {
        StorageBackend::Fs => match &config.storage.root {
            None => anyhow::bail!("storage.root is required for the fs backend"),
            Some(root) if !root.exists() => {
                tracing::warn!("Storage root does not exist: {:?}", root);
            }
            Some(_) => {}
        },
        StorageBackend::S3 => {
            if config.storage.access_key.is_some() != config.storage.secret_key.is_some() {
                anyhow::bail!("storage.access_key and storage.secret_key must be set together");
            }
        }
        StorageBackend::Memory => {}
    }

    if config.storage.video_bucket.is_empty() || config.storage.cover_bucket.is_empty() {
        anyhow::bail!("Bucket names cannot be empty");
    }

    Ok(())
}
