//! Configuration loaded from the environment (and `.env` when present).

use crate::application::cleanup::CleanupSettings;
use crate::application::pipeline::PipelineSettings;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration shared by every deployment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Parent of the per-run workspaces
    pub scratch_dir: PathBuf,
    /// Root of the filesystem bucket used by the local store
    pub storage_dir: PathBuf,
    pub frame_interval_secs: u32,
    /// Upper bound for a single ffmpeg or zip run
    pub tool_timeout: Duration,
    pub ffmpeg_bin: String,
    pub zip_bin: String,
    /// Optional upload cap; uploads are unbounded when unset
    pub max_upload_bytes: Option<usize>,
    /// Token introspection endpoint of the identity service
    pub identity_url: String,
    pub cleanup_workers: usize,
    pub cleanup_max_attempts: u32,
    pub cleanup_retry_delay: Duration,
    /// Age after which a `processing` record is considered abandoned
    pub stale_processing: Duration,
    pub reconcile_interval: Duration,
    /// Redis connection URL; in-memory records are used when unset
    pub redis_url: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| String::from(default))
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(name, value = %raw, "ignoring unparsable setting");
                default
            }
        },
        Err(_) => default,
    }
}

fn optional_parsed<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok().filter(|raw| !raw.trim().is_empty())?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: var_or("ADDR", "127.0.0.1"),
            port: var_or("PORT", "3333"),
            scratch_dir: PathBuf::from(var_or("SCRATCH_DIR", "./scratch")),
            storage_dir: PathBuf::from(var_or("STORAGE_DIR", "./bucket")),
            frame_interval_secs: parsed_or("FRAME_INTERVAL_SECS", 4u32).max(1),
            tool_timeout: Duration::from_secs(parsed_or("TOOL_TIMEOUT_SECS", 600)),
            ffmpeg_bin: var_or("FFMPEG_BIN", "ffmpeg"),
            zip_bin: var_or("ZIP_BIN", "zip"),
            max_upload_bytes: optional_parsed("MAX_UPLOAD_BYTES"),
            identity_url: var_or("IDENTITY_URL", "http://svc-user-app/token"),
            cleanup_workers: parsed_or("CLEANUP_WORKERS", 2usize).max(1),
            cleanup_max_attempts: parsed_or("CLEANUP_MAX_ATTEMPTS", 5u32).max(1),
            cleanup_retry_delay: Duration::from_millis(parsed_or("CLEANUP_RETRY_DELAY_MS", 500)),
            stale_processing: Duration::from_secs(parsed_or("STALE_PROCESSING_SECS", 3600)),
            reconcile_interval: Duration::from_secs(
                parsed_or("RECONCILE_INTERVAL_SECS", 300u64).max(1),
            ),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            scratch_dir: self.scratch_dir.clone(),
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            zip_bin: self.zip_bin.clone(),
            frame_interval_secs: self.frame_interval_secs,
        }
    }

    pub fn cleanup_settings(&self) -> CleanupSettings {
        CleanupSettings {
            workers: self.cleanup_workers,
            max_attempts: self.cleanup_max_attempts,
            retry_delay: self.cleanup_retry_delay,
        }
    }
}

/// Configuration for the AWS deployment.
#[cfg(feature = "aws")]
#[derive(Clone, Debug)]
pub struct AwsConfig {
    /// S3 bucket for archives
    pub s3_bucket: String,
    /// DynamoDB table for video records
    pub dynamodb_table: String,
    /// Global secondary index keyed by `owner_id`
    pub owner_index: String,
}

#[cfg(feature = "aws")]
impl AwsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            s3_bucket: env::var("S3_BUCKET")?,
            dynamodb_table: env::var("DYNAMODB_TABLE")?,
            owner_index: var_or("DYNAMODB_OWNER_INDEX", "owner_index"),
        })
    }
}
