use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::storage::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    /// Page size used when a list request does not give one
    pub default_per_page: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Origins allowed by CORS. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the upload log, counters, lock marker and content document
    pub data_dir: PathBuf,
    /// Directory holding uploaded payloads
    pub uploads_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum size of a single uploaded file in bytes
    pub max_file_size: u64,
    /// Maximum number of files in one upload request
    pub max_files: usize,
    pub uploader_name: String,
    pub lock_retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            uploads_dir: PathBuf::from("./uploads"),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_files: 10,
            uploader_name: "System".to_string(),
            lock_retry: RetryPolicy::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            default_per_page: 7,
        }
    }
}

impl StorageConfig {
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("uploadLog.json")
    }

    pub fn id_counter_path(&self) -> PathBuf {
        self.data_dir.join("idCounter.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("upload.lock")
    }

    pub fn content_path(&self) -> PathBuf {
        self.data_dir.join("imgScrollData.json")
    }

    pub fn content_counter_path(&self) -> PathBuf {
        self.data_dir.join("imgScrollCounter.json")
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{port}")
        });

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .map(|o| {
                o.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.data_dir);
        let uploads_dir = std::env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.uploads_dir);

        let lock_retry = RetryPolicy {
            max_attempts: env_parse("LOCK_RETRY_ATTEMPTS")
                .unwrap_or(defaults.upload.lock_retry.max_attempts),
            interval: env_parse("LOCK_RETRY_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload.lock_retry.interval),
        };

        let config = Config {
            server: ServerConfig {
                bind_address,
                cors_origins,
            },
            storage: StorageConfig {
                data_dir,
                uploads_dir,
            },
            upload: UploadConfig {
                max_file_size: env_parse("MAX_UPLOAD_SIZE")
                    .unwrap_or(defaults.upload.max_file_size),
                max_files: env_parse("MAX_UPLOAD_FILES").unwrap_or(defaults.upload.max_files),
                uploader_name: std::env::var("UPLOADER_NAME")
                    .unwrap_or(defaults.upload.uploader_name),
                lock_retry,
            },
            default_per_page: env_parse("DEFAULT_PER_PAGE").unwrap_or(defaults.default_per_page),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.upload.max_files == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_FILES must be greater than 0".to_string(),
            ));
        }

        if self.upload.lock_retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "LOCK_RETRY_ATTEMPTS must be greater than 0".to_string(),
            ));
        }

        if self.default_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "DEFAULT_PER_PAGE must be greater than 0".to_string(),
            ));
        }

        if self.storage.data_dir == self.storage.uploads_dir {
            tracing::warn!(
                "DATA_DIR and UPLOADS_DIR are the same directory; \
                 the upload log will be downloadable as a payload"
            );
        }

        Ok(())
    }

    /// Total request body size an upload may reach: every file at the limit plus headroom
    /// for multipart framing.
    pub fn upload_body_limit(&self) -> usize {
        let files = self.upload.max_file_size.saturating_mul(self.upload.max_files as u64);
        files.saturating_add(1024 * 1024).min(usize::MAX as u64) as usize
    }
}
