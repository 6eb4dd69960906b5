use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests from any origin (browser players on other hosts)
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allow_any: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the video catalog
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vidserve.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Fs,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// S3 endpoint URL; unset means AWS proper
    #[serde(default = "default_endpoint")]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_minio_credential")]
    pub access_key: Option<String>,

    #[serde(default = "default_minio_credential")]
    pub secret_key: Option<String>,

    /// Use path-style addressing (required by MinIO)
    #[serde(default = "default_true")]
    pub path_style: bool,

    /// Base directory for the fs backend; buckets are sub-directories
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default = "default_video_bucket")]
    pub video_bucket: String,

    #[serde(default = "default_cover_bucket")]
    pub cover_bucket: String,
}

fn default_endpoint() -> Option<String> {
    Some("http://minio:9000".to_string())
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_minio_credential() -> Option<String> {
    Some("minioadmin".to_string())
}

fn default_video_bucket() -> String {
    "video-files".to_string()
}

fn default_cover_bucket() -> String {
    "video-covers".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            endpoint: default_endpoint(),
            region: default_region(),
            access_key: default_minio_credential(),
            secret_key: default_minio_credential(),
            path_style: true,
            root: None,
            video_bucket: default_video_bucket(),
            cover_bucket: default_cover_bucket(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Bytes pulled from the object store per relay step (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Deadline for each chunk read and write; 0 disables (default: 30)
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_chunk_timeout() -> u64 {
    30
}

impl StreamingConfig {
    pub fn chunk_timeout(&self) -> Option<Duration> {
        (self.chunk_timeout_secs > 0).then(|| Duration::from_secs(self.chunk_timeout_secs))
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_timeout_secs: default_chunk_timeout(),
        }
    }
}
